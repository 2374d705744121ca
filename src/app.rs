//! App: terminal init, main loop, fixed-rate ticking and key handling.

use crate::Args;
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, Hud};
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use grainflow::Simulation;
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tracing::info;

const MIN_TICK_RATE: f64 = 1.0;
const MAX_TICK_RATE: f64 = 960.0;
/// Multiplier applied by the speed keys.
const SPEED_STEP: f64 = 1.5;
/// Upper bound on ticks run in one frame when the loop falls behind.
const MAX_CATCH_UP: u32 = 8;

/// Ticks per second measured over roughly one-second windows.
#[derive(Debug)]
struct TickMeter {
    window_start: Instant,
    ticks: u32,
    rate: f64,
}

impl TickMeter {
    fn new(now: Instant) -> Self {
        Self { window_start: now, ticks: 0, rate: 0.0 }
    }

    fn record(&mut self, ticks: u32, now: Instant) {
        self.ticks += ticks;
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.rate = f64::from(self.ticks) / elapsed.as_secs_f64();
            self.ticks = 0;
            self.window_start = now;
        }
    }
}

pub struct App {
    args: Args,
    theme: Theme,
    /// Built once the terminal size is known.
    sim: Option<(Simulation, u64)>,
    paused: bool,
    tick_rate: f64,
    last_tick: Instant,
    meter: TickMeter,
}

impl App {
    pub fn new(args: Args, theme: Theme) -> Self {
        let now = Instant::now();
        let tick_rate = args.tick_rate.clamp(MIN_TICK_RATE, MAX_TICK_RATE);
        Self {
            args,
            theme,
            sim: None,
            paused: false,
            tick_rate,
            last_tick: now,
            meter: TickMeter::new(now),
        }
    }

    /// Builds a new world sized to the terminal unless `--width`/`--height` say otherwise.
    /// The first world uses `--seed`; regenerated worlds draw a fresh one.
    fn regenerate(&mut self) -> Result<()> {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        let (fit_w, fit_h) = ui::world_size_for_terminal(cols, rows);
        let width = self.args.width.unwrap_or(fit_w);
        let height = self.args.height.unwrap_or(fit_h);
        let seed = match (&self.sim, self.args.seed) {
            (None, Some(seed)) => seed,
            _ => rand::random(),
        };
        let sim = crate::build_simulation(&self.args, width, height, seed)?;
        self.sim = Some((sim, seed));
        self.last_tick = Instant::now();
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        self.regenerate()?;

        enable_raw_mode().context("enabling raw mode")?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
        let mut terminal = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))
            .context("creating terminal")?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        if let Some((sim, seed)) = &self.sim {
            let stats = sim.stats();
            info!(seed, iteration = stats.iteration, sand = stats.sand, "session ended");
        }
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.args.frame_rate.max(1.0));
        loop {
            let frame_start = Instant::now();
            if let Some((sim, seed)) = &self.sim {
                let hud = Hud {
                    paused: self.paused,
                    tick_rate: self.tick_rate,
                    measured_tps: self.meter.rate,
                    seed: *seed,
                };
                terminal.draw(|f| ui::draw(f, sim, &self.theme, &hud))?;
            }

            let timeout = frame_duration.saturating_sub(frame_start.elapsed());
            let mut stepped = 0;
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match key_to_action(key) {
                        Action::Quit => return Ok(()),
                        Action::Pause => self.paused = !self.paused,
                        Action::Step if self.paused => {
                            if let Some((sim, _)) = &mut self.sim {
                                sim.tick();
                                stepped += 1;
                            }
                        }
                        Action::Faster => self.tick_rate = (self.tick_rate * SPEED_STEP).min(MAX_TICK_RATE),
                        Action::Slower => self.tick_rate = (self.tick_rate / SPEED_STEP).max(MIN_TICK_RATE),
                        Action::Regenerate => self.regenerate()?,
                        Action::Step | Action::None => {}
                    }
                }
            }

            let now = Instant::now();
            if self.paused {
                self.last_tick = now;
            } else if let Some((sim, _)) = &mut self.sim {
                let interval = Duration::from_secs_f64(1.0 / self.tick_rate);
                while now.duration_since(self.last_tick) >= interval && stepped < MAX_CATCH_UP {
                    sim.tick();
                    self.last_tick += interval;
                    stepped += 1;
                }
                if stepped == MAX_CATCH_UP {
                    // Too far behind; drop the backlog.
                    self.last_tick = now;
                }
            }
            self.meter.record(stepped, now);
        }
    }
}
