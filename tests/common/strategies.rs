use proptest::prelude::*;

use migrator_core::config::PipelineParams;
use migrator_core::constants::ValidationLevel;
use migrator_core::orchestration::Phase;

pub fn validation_level_strategy() -> impl Strategy<Value = ValidationLevel> {
    prop_oneof![
        Just(ValidationLevel::Basic),
        Just(ValidationLevel::Strict),
        Just(ValidationLevel::Exhaustive),
    ]
}

pub fn pipeline_params_strategy() -> impl Strategy<Value = PipelineParams> {
    (validation_level_strategy(), any::<bool>(), 1usize..=16).prop_map(
        |(level, enable_rollback, max_concurrency)| {
            PipelineParams::default()
                .with_validation_level(level)
                .with_rollback(enable_rollback)
                .with_max_concurrency(max_concurrency)
        },
    )
}

/// Transformation ids such as `imports` or `strict_null`
pub fn transformations_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z_]{1,12}", 0..6)
}

/// Acyclic phase lists: every edge points from a lower to a higher index
pub fn acyclic_phases_strategy() -> impl Strategy<Value = Vec<Phase>> {
    (1usize..10).prop_flat_map(|count| {
        prop::collection::vec(any::<bool>(), count * count).prop_map(move |edges| {
            (0..count)
                .map(|to| {
                    let prerequisites: Vec<String> = (0..to)
                        .filter(|from| edges[from * count + to])
                        .map(|from| format!("phase-{from}"))
                        .collect();
                    let mut phase = Phase::new(&format!("phase-{to}"), &format!("Phase {to}"));
                    phase.prerequisites = prerequisites;
                    phase
                })
                .collect()
        })
    })
}
