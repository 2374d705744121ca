//! Layout and drawing: playfield, sidebar stats, pause overlay.

use crate::theme::Theme;
use grainflow::{Pos, Simulation, Status};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

/// We use half-blocks (▀) to get 2 grid rows per terminal row.
const HALF_BLOCK: &str = "▀";
pub const SIDEBAR_WIDTH: u16 = 26;
const MIN_WORLD_WIDTH: usize = 8;
const MIN_WORLD_HEIGHT: usize = 6;

/// Values the sidebar shows that the simulation does not track itself.
#[derive(Debug, Clone, Copy)]
pub struct Hud {
    pub paused: bool,
    pub tick_rate: f64,
    pub measured_tps: f64,
    pub seed: u64,
}

/// World size (cells) that fills a terminal of `cols` x `rows` next to the sidebar.
pub fn world_size_for_terminal(cols: u16, rows: u16) -> (usize, usize) {
    let w = usize::from(cols.saturating_sub(SIDEBAR_WIDTH).saturating_sub(2));
    let h = usize::from(rows.saturating_sub(2)) * 2;
    (w.max(MIN_WORLD_WIDTH), h.max(MIN_WORLD_HEIGHT))
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

pub fn draw(frame: &mut Frame, sim: &Simulation, theme: &Theme, hud: &Hud) {
    let area = frame.area();
    let (w, h) = sim.grid().dims();
    let pw = to_u16(w).saturating_add(2);
    let ph = to_u16(h.div_ceil(2)).saturating_add(2);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(pw),
            Constraint::Length(SIDEBAR_WIDTH),
            Constraint::Fill(1),
        ])
        .split(area);
    let playfield_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(ph), Constraint::Fill(1)])
        .split(cols[0])[0];

    draw_playfield(frame, sim, theme, playfield_area);
    draw_sidebar(frame, sim, theme, hud, cols[1]);
    if hud.paused {
        draw_pause_overlay(frame, theme, playfield_area);
    }
}

fn draw_playfield(frame: &mut Frame, sim: &Simulation, theme: &Theme, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" grainflow ", theme.title));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let grid = sim.grid();
    let color_at = |x: usize, y: usize| grid.get(Pos::new(x, y)).map_or(theme.bg, |c| theme.cell_color(c));
    let buf = frame.buffer_mut();
    for ty in 0..inner.height {
        let y = usize::from(ty) * 2;
        if y >= grid.height() {
            break;
        }
        for tx in 0..inner.width {
            let x = usize::from(tx);
            if x >= grid.width() {
                break;
            }
            buf[(inner.x + tx, inner.y + ty)]
                .set_symbol(HALF_BLOCK)
                .set_style(Style::default().fg(color_at(x, y)).bg(color_at(x, y + 1)));
        }
    }
}

fn stat_line<'a>(label: &'a str, value: String, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(theme.title)),
        Span::styled(value, Style::default().fg(theme.main_fg)),
    ])
}

fn draw_section(frame: &mut Frame, theme: &Theme, area: Rect, title: &str, lines: Vec<Line<'_>>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(format!(" {title} "), theme.title));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());
    Paragraph::new(Text::from(lines)).render(inner, frame.buffer_mut());
}

fn draw_sidebar(frame: &mut Frame, sim: &Simulation, theme: &Theme, hud: &Hud, area: Rect) {
    let stats = sim.stats();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Simulation
            Constraint::Length(7), // Grains
            Constraint::Length(7), // Keys
        ])
        .split(area);

    let state = if hud.paused { "paused" } else { "running" };
    draw_section(
        frame,
        theme,
        chunks[0],
        "Simulation",
        vec![
            stat_line("Iteration: ", stats.iteration.to_string(), theme),
            stat_line("Active:    ", stats.active.to_string(), theme),
            stat_line("Ticks/s:   ", format!("{:.0}/{:.0} {state}", hud.measured_tps, hud.tick_rate), theme),
            stat_line("Seed:      ", hud.seed.to_string(), theme),
        ],
    );

    let grains = [Status::Idle, Status::Falling, Status::Rolling, Status::Settled]
        .into_iter()
        .map(|s| stat_line(s.label(), format!(": {}", stats.count(s)), theme));
    let mut lines = vec![stat_line("Sand", format!(": {}", stats.sand), theme)];
    lines.extend(grains);
    draw_section(frame, theme, chunks[1], "Grains", lines);

    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(k, Style::default().fg(theme.title)),
            Span::styled(what, Style::default().fg(theme.inactive_fg)),
        ])
    };
    draw_section(
        frame,
        theme,
        chunks[2],
        "Keys",
        vec![
            key("P/Space ", "pause"),
            key(".       ", "step"),
            key("+/-     ", "speed"),
            key("R       ", "new world"),
            key("Q/Esc   ", "quit"),
        ],
    );
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(theme.title),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " . step   P resume ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}
