//! Bidirectional mapping between the stable level enum and the codec's
//! signed level "cookie", grounded in the original `fastlevels[]` table.

/// Filesystem-visible compression level. Stable across codec versions; the
/// codec-level `cookie` it maps to is free to change meaning as long as the
/// table below is updated alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    L1,
    L2,
    L3,
    L4,
    L5,
    L6,
    L7,
    L8,
    L9,
    L10,
    L11,
    L12,
    L13,
    L14,
    L15,
    L16,
    L17,
    L18,
    L19,
    Fast1,
    Fast2,
    Fast3,
    Fast4,
    Fast5,
    Fast6,
    Fast7,
    Fast8,
    Fast9,
    Fast10,
    Fast20,
    Fast30,
    Fast40,
    Fast50,
    Fast60,
    Fast70,
    Fast80,
    Fast90,
    Fast100,
    Fast500,
    Fast1000,
    /// Must never be looked up against the table; see `to_cookie`.
    Inherit,
    /// Resolves to `L3` before any lookup on the compress path.
    Default,
}

/// Legacy spelling of [`Level::Default`], accepted wherever `DEFAULT` is
/// accepted on the compress path.
pub const COMPLEVEL_DEFAULT: i32 = 255;

/// The canonical level `DEFAULT` resolves to.
pub const CANONICAL_DEFAULT_LEVEL: Level = Level::L3;

const LEVEL_TABLE: &[(Level, i32)] = &[
    (Level::L1, 1),
    (Level::L2, 2),
    (Level::L3, 3),
    (Level::L4, 4),
    (Level::L5, 5),
    (Level::L6, 6),
    (Level::L7, 7),
    (Level::L8, 8),
    (Level::L9, 9),
    (Level::L10, 10),
    (Level::L11, 11),
    (Level::L12, 12),
    (Level::L13, 13),
    (Level::L14, 14),
    (Level::L15, 15),
    (Level::L16, 16),
    (Level::L17, 17),
    (Level::L18, 18),
    (Level::L19, 19),
    (Level::Fast1, -1),
    (Level::Fast2, -2),
    (Level::Fast3, -3),
    (Level::Fast4, -4),
    (Level::Fast5, -5),
    (Level::Fast6, -6),
    (Level::Fast7, -7),
    (Level::Fast8, -8),
    (Level::Fast9, -9),
    (Level::Fast10, -10),
    (Level::Fast20, -20),
    (Level::Fast30, -30),
    (Level::Fast40, -40),
    (Level::Fast50, -50),
    (Level::Fast60, -60),
    (Level::Fast70, -70),
    (Level::Fast80, -80),
    (Level::Fast90, -90),
    (Level::Fast100, -100),
    (Level::Fast500, -500),
    (Level::Fast1000, -1000),
];

/// Every level the table knows about, excluding the two sentinels. Used by
/// property tests that need to sample "a real level". Derived from
/// `LEVEL_TABLE` rather than listed separately, so a level added to the table
/// can never go missing here.
const fn all_levels() -> [Level; LEVEL_TABLE.len()] {
    let mut levels = [Level::Default; LEVEL_TABLE.len()];
    let mut i = 0;
    while i < LEVEL_TABLE.len() {
        levels[i] = LEVEL_TABLE[i].0;
        i += 1;
    }
    levels
}

const ALL_LEVELS_ARRAY: [Level; LEVEL_TABLE.len()] = all_levels();

pub const ALL_LEVELS: &[Level] = &ALL_LEVELS_ARRAY;

impl Level {
    /// Resolves `DEFAULT` (and the legacy `COMPLEVEL_DEFAULT` alias, which
    /// never reaches this type since callers translate it to `Level::Default`
    /// beforehand) to the canonical level before a table lookup.
    pub fn resolve_for_compress(self) -> Level {
        match self {
            Level::Default => CANONICAL_DEFAULT_LEVEL,
            other => other,
        }
    }

    /// Translates a level to the codec's signed cookie.
    ///
    /// `INHERIT` must never reach this method; callers are contractually
    /// forbidden from passing it. Debug builds assert the contract; release
    /// builds log and coerce to the canonical default rather than
    /// propagating a panic into the data path.
    pub fn to_cookie(self) -> i32 {
        debug_assert_ne!(
            self, Level::Inherit,
            "INHERIT must never be translated to a codec cookie"
        );
        let level = match self {
            Level::Inherit => {
                log::error!("zstd-block-adapter: INHERIT level passed where a concrete level was required");
                CANONICAL_DEFAULT_LEVEL
            }
            other => other.resolve_for_compress(),
        };
        for &(candidate, cookie) in LEVEL_TABLE {
            if candidate == level {
                return cookie;
            }
        }
        unreachable!("every resolved, non-sentinel Level has a table entry")
    }

    /// Translates a codec cookie back to a level. An unknown cookie is
    /// treated as a programming error on the read path: it is logged and
    /// coerced to the canonical default rather than corrupting the caller's
    /// view of the block.
    pub fn from_cookie(cookie: i32) -> Level {
        for &(level, candidate) in LEVEL_TABLE {
            if candidate == cookie {
                return level;
            }
        }
        log::error!("zstd-block-adapter: unknown level cookie {cookie}, coercing to default");
        CANONICAL_DEFAULT_LEVEL
    }
}

/// Free-function alias for [`Level::to_cookie`], named after the original.
pub fn enum_to_cookie(level: Level) -> i32 {
    level.to_cookie()
}

/// Free-function alias for [`Level::from_cookie`], named after the original.
pub fn cookie_to_enum(cookie: i32) -> Level {
    Level::from_cookie(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Level::L1, 1)]
    #[case(Level::L19, 19)]
    #[case(Level::Fast1, -1)]
    #[case(Level::Fast10, -10)]
    #[case(Level::Fast1000, -1000)]
    fn known_levels_map_to_their_documented_cookie(#[case] level: Level, #[case] cookie: i32) {
        assert_eq!(level.to_cookie(), cookie);
    }

    #[test]
    fn default_resolves_to_canonical_level_three() {
        assert_eq!(Level::Default.to_cookie(), 3);
    }

    #[test]
    fn unknown_cookie_coerces_to_default() {
        assert_eq!(Level::from_cookie(31337), CANONICAL_DEFAULT_LEVEL);
    }

    #[test]
    fn level_map_is_bijective_for_every_real_level() {
        for &level in ALL_LEVELS {
            let cookie = enum_to_cookie(level);
            assert_eq!(cookie_to_enum(cookie), level);
        }
    }

}
