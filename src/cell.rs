//! Cell model: material sum type, per-cell status and the sand configuration table.

/// Number of sand variants. Variant 0 is the coarsest, 5 the finest.
pub const SAND_VARIANTS: usize = 6;

/// Flow parameters shared by every particle of one sand variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialConfig {
    /// Lateral search radius when rolling; also sizes the roll episode budget.
    pub fluidity: u8,
    /// Base probability that a blocked particle attempts to roll.
    pub roll_chance: f32,
    /// Ticks a falling particle waits before advancing one row.
    pub fall_delay: u8,
}

/// Coarse sand falls fastest and spreads least; powder sinks slowly and spreads far.
pub const SAND_CONFIG: [MaterialConfig; SAND_VARIANTS] = [
    MaterialConfig { fluidity: 1, roll_chance: 0.8, fall_delay: 0 },
    MaterialConfig { fluidity: 2, roll_chance: 0.9, fall_delay: 1 },
    MaterialConfig { fluidity: 2, roll_chance: 0.95, fall_delay: 1 },
    MaterialConfig { fluidity: 3, roll_chance: 0.98, fall_delay: 2 },
    MaterialConfig { fluidity: 4, roll_chance: 1.0, fall_delay: 3 },
    MaterialConfig { fluidity: 5, roll_chance: 1.0, fall_delay: 4 },
];

/// Index into [`SAND_CONFIG`]. Always in `0..SAND_VARIANTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SandVariant(u8);

impl SandVariant {
    pub const ALL: [Self; SAND_VARIANTS] = [Self(0), Self(1), Self(2), Self(3), Self(4), Self(5)];

    /// Returns `None` for ids outside the table.
    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < SAND_VARIANTS { Some(Self(id)) } else { None }
    }

    #[inline]
    pub const fn id(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn config(self) -> MaterialConfig {
        SAND_CONFIG[self.0 as usize]
    }
}

/// What occupies a grid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Material {
    #[default]
    Empty,
    Stone,
    Sand(SandVariant),
}

impl Material {
    #[inline]
    pub const fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    #[inline]
    pub const fn is_sand(self) -> bool {
        matches!(self, Self::Sand(_))
    }

    /// Configuration for sand; `None` for Empty and Stone.
    #[inline]
    pub const fn config(self) -> Option<MaterialConfig> {
        match self {
            Self::Sand(v) => Some(v.config()),
            _ => None,
        }
    }
}

/// Per-cell automaton state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// At rest; evaluated each tick for reactivation and settling.
    #[default]
    Idle,
    Falling,
    Rolling,
    /// Rechecks roll eligibility before committing to a roll.
    PendingRoll,
    /// Immovable. Stone only.
    Fixed,
    /// Dormant; only the periodic rescan looks at it.
    Settled,
}

impl Status {
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Falling,
        Self::Rolling,
        Self::PendingRoll,
        Self::Fixed,
        Self::Settled,
    ];

    /// Moving particles are what wakes settled neighbours during a rescan.
    #[inline]
    pub const fn is_moving(self) -> bool {
        matches!(self, Self::Falling | Self::Rolling)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Falling => "Falling",
            Self::Rolling => "Rolling",
            Self::PendingRoll => "PendingRoll",
            Self::Fixed => "Fixed",
            Self::Settled => "Settled",
        }
    }
}

/// One grid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub material: Material,
    pub status: Status,
    pub fluidity: u8,
    /// Lateral moves taken in the current roll episode.
    pub roll_count: u8,
    /// -1, 0 or +1.
    pub last_roll_dir: i8,
    pub stable_frames: u32,
    pub fall_counter: u8,
    /// Iteration in which this particle last ran a handler or arrived by a move.
    pub last_checked: u64,
}

impl Cell {
    pub const EMPTY: Self = Self {
        material: Material::Empty,
        status: Status::Idle,
        fluidity: 0,
        roll_count: 0,
        last_roll_dir: 0,
        stable_frames: 0,
        fall_counter: 0,
        last_checked: 0,
    };

    pub const fn stone() -> Self {
        Self { material: Material::Stone, status: Status::Fixed, ..Self::EMPTY }
    }

    /// Freshly placed sand: `Idle`, fluidity copied from the variant's config.
    pub const fn sand(variant: SandVariant) -> Self {
        Self {
            material: Material::Sand(variant),
            fluidity: variant.config().fluidity,
            ..Self::EMPTY
        }
    }

    /// Builds a cell for any material, stone fixed and sand idle.
    pub const fn of(material: Material) -> Self {
        match material {
            Material::Empty => Self::EMPTY,
            Material::Stone => Self::stone(),
            Material::Sand(v) => Self::sand(v),
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.material.is_empty()
    }

    #[inline]
    pub const fn is_sand(&self) -> bool {
        self.material.is_sand()
    }

    /// Back to `Idle` with roll bookkeeping, stability count and fall counter cleared.
    pub const fn into_idle(self) -> Self {
        Self {
            status: Status::Idle,
            roll_count: 0,
            last_roll_dir: 0,
            stable_frames: 0,
            fall_counter: 0,
            ..self
        }
    }

    /// Consecutive lateral moves allowed before the particle must go idle.
    #[inline]
    pub const fn max_rolls(&self) -> u8 {
        1 + self.fluidity / 2
    }
}
