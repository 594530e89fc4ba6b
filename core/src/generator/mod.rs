use alloc::vec::Vec;

use crate::*;
pub use random::*;

mod random;

/// Anything that can hand out the configuration of a numbered level.
pub trait LevelSource {
    fn level_config(&self, level: u32) -> Option<LevelConfig>;
}

const LEVELS_PER_BLOCK: u32 = 20;

/// Procedural levels: every block of 20 levels ramps difficulty, with tower defense on every fifth level and
/// a clear level on every third of the rest.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LevelGenerator;

impl LevelGenerator {
    pub fn generate(level: u32) -> LevelConfig {
        let level = level.max(1);
        let block = (level - 1) / LEVELS_PER_BLOCK;
        let index = (level - 1) % LEVELS_PER_BLOCK;
        let seed = LevelConfig::default_seed(level);

        let config = match index {
            4 | 9 | 14 | 19 => Self::tower_defense(level, block, seed),
            _ if index % 3 == 2 => Self::clear(level, block, seed),
            _ => Self::score(level, block),
        };
        log::debug!("Generated level {level}: {}", config.description());
        config.with_seed(seed)
    }

    fn score(level: u32, block: u32) -> LevelConfig {
        let target_score = 50 + block * 30 + (level % LEVELS_PER_BLOCK) * 10;
        LevelConfig::score_level(level, target_score, 20 + block * 2)
    }

    fn clear(level: u32, block: u32, seed: u64) -> LevelConfig {
        let (width, height) = LevelConfig::board_size_for_level(level);
        let mut rng = GameRng::new(seed);
        let mut frozen_rng = rng.fork();
        let mut box_rng = rng.fork();
        let mut color_rng = rng.fork();
        let mut zone_rng = rng.fork();

        let mut obstacles = Vec::new();

        // keep the top two rows free so the board can refill
        let frozen_count = 5 + block * 2 + level % 5;
        let max_durability = (1 + block).min(4) as usize;
        for _ in 0..frozen_count {
            let row = 2 + pick(&mut frozen_rng, height - 2);
            let col = pick(&mut frozen_rng, width);
            let durability = 1 + frozen_rng.next_index(max_durability) as u32;
            obstacles.push(ObstacleConfig::frozen(Position::new(row, col), durability));
        }

        if block >= 1 {
            for _ in 0..1 + block / 2 {
                let row = 2 + pick(&mut box_rng, height - 2);
                let col = 1 + pick(&mut box_rng, width - 2);
                obstacles.push(ObstacleConfig::boxed(Position::new(row, col), 2));
            }
        }

        if block >= 2 {
            for _ in 0..block / 2 {
                let row = 2 + pick(&mut color_rng, height - 2);
                let col = pick(&mut color_rng, width);
                let color = color_rng.next_color();
                obstacles.push(ObstacleConfig::color_box(Position::new(row, col), 3, color));
            }
        }

        if block >= 1 && level % 4 == 0 {
            let start = Position::new(
                3 + pick(&mut zone_rng, height - 4),
                1 + pick(&mut zone_rng, width - 3),
            );
            for d_row in 0..2 {
                for d_col in 0..3 {
                    obstacles.push(ObstacleConfig::frozen_zone(start.offset(d_row, d_col), 1));
                }
            }
        }

        LevelConfig::clear_level(level, 25 + block * 3, obstacles)
    }

    fn tower_defense(level: u32, block: u32, seed: u64) -> LevelConfig {
        let max_turns = 30 + block * 5;
        let width = LevelConfig::board_size_for_level(level).0;
        let center = width / 2;
        let mut rng = GameRng::new(seed);
        let mut enemies = Vec::new();

        let first_wave = 3 + block;
        for i in 0..first_wave {
            enemies.push(EnemyConfig {
                kind: EnemyKind::Basic,
                spawn_turn: 1 + i * 2,
                column: pick(&mut rng, width),
                hp: 2 + block,
            });
        }

        if block >= 1 {
            let start = first_wave * 2 + 3;
            for i in 0..2 + block {
                let (kind, hp) = if i % 3 == 0 {
                    (EnemyKind::Controller, 4 + block)
                } else {
                    (EnemyKind::Basic, 3 + block)
                };
                enemies.push(EnemyConfig {
                    kind,
                    spawn_turn: start + i * 2,
                    column: pick(&mut rng, width),
                    hp,
                });
            }
        }

        if block >= 2 {
            enemies.push(EnemyConfig {
                kind: EnemyKind::Spawner,
                spawn_turn: max_turns - 10,
                column: center,
                hp: 6 + block * 2,
            });
        }

        if level % LEVELS_PER_BLOCK == 0 {
            enemies.push(EnemyConfig {
                kind: EnemyKind::Boss,
                spawn_turn: max_turns - 5,
                column: center,
                hp: 15 + block * 5,
            });
        }

        LevelConfig::tower_defense_level(level, max_turns, enemies)
    }
}

impl LevelSource for LevelGenerator {
    fn level_config(&self, level: u32) -> Option<LevelConfig> {
        (level > 0).then(|| Self::generate(level))
    }
}

fn pick(rng: &mut GameRng, bound: Coord) -> Coord {
    rng.next_index(bound.max(0) as usize) as Coord
}
