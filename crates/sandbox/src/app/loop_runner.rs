use std::fs;
use std::process::ExitCode;

use groundwork::{CollisionKind, Point};
use tracing::{error, info};

use super::bootstrap::SandboxConfig;
use super::scenario::{build_scenario, parse_scenario_json, LoadedScenario};
use super::SandboxError;

const BUNDLED_SCENARIO: &str = include_str!("../../scenarios/notch.json");

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u32,
    pub(crate) collision_events: usize,
    pub(crate) final_positions: Vec<(String, Point)>,
}

pub(crate) fn run(config: SandboxConfig) -> ExitCode {
    match load_scenario_source(&config).and_then(|raw| run_scenario(&config, &raw)) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                collision_events = summary.collision_events,
                entities = summary.final_positions.len(),
                "sandbox_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "sandbox_failed");
            ExitCode::FAILURE
        }
    }
}

fn load_scenario_source(config: &SandboxConfig) -> Result<String, SandboxError> {
    match &config.scenario_path {
        Some(path) => fs::read_to_string(path).map_err(|source| SandboxError::ReadScenario {
            path: path.clone(),
            source,
        }),
        None => Ok(BUNDLED_SCENARIO.to_string()),
    }
}

pub(crate) fn run_scenario(config: &SandboxConfig, raw: &str) -> Result<RunSummary, SandboxError> {
    let scenario = parse_scenario_json(raw)?;
    let mut loaded = build_scenario(&scenario)?;

    let mut collision_events = 0;
    for tick in 1..=config.ticks {
        let now = u64::from(tick) * config.tick_ms;
        loaded.map.update(now);
        for event in loaded.map.drain_collision_events() {
            collision_events += 1;
            let mode = match event.kind {
                CollisionKind::Mode(mode) => format!("{mode:?}"),
                CollisionKind::Sprite { .. } => "sprite".to_string(),
            };
            info!(
                now,
                detector = loaded.name(event.detector),
                candidate = loaded.name(event.candidate),
                mode = mode.as_str(),
                "collision_event"
            );
        }
        if config.position_log_interval > 0 && tick % config.position_log_interval == 0 {
            log_positions(&loaded, now);
        }
    }

    let final_positions = final_positions(&loaded);
    for (name, xy) in &final_positions {
        info!(entity = name.as_str(), x = xy.x, y = xy.y, "final_position");
    }
    Ok(RunSummary {
        ticks: config.ticks,
        collision_events,
        final_positions,
    })
}

fn log_positions(loaded: &LoadedScenario, now: u64) {
    for entity in loaded.map.entities() {
        let state = entity
            .movement()
            .map(|movement| format!("{:?}", movement.state()));
        info!(
            now,
            entity = loaded.name(entity.id()),
            x = entity.xy().x,
            y = entity.xy().y,
            movement = state.as_deref().unwrap_or("none"),
            "entity_position"
        );
    }
}

fn final_positions(loaded: &LoadedScenario) -> Vec<(String, Point)> {
    loaded
        .names
        .iter()
        .filter_map(|(name, id)| {
            loaded
                .map
                .entity(*id)
                .map(|entity| (name.clone(), entity.xy()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(summary: &RunSummary, name: &str) -> Point {
        summary
            .final_positions
            .iter()
            .find(|(entity, _)| entity == name)
            .map(|(_, xy)| *xy)
            .expect("entity position")
    }

    #[test]
    fn bundled_scenario_runs_end_to_end() {
        let config = SandboxConfig {
            ticks: 200,
            ..SandboxConfig::default()
        };
        let summary = run_scenario(&config, BUNDLED_SCENARIO).expect("run");
        assert_eq!(summary.ticks, 200);

        let hero = position(&summary, "hero");
        assert!(hero.x > 72, "hero stuck at {hero:?}");
        assert_eq!(hero.y, 8);
        assert!(summary.collision_events > 0);
    }

    #[test]
    fn missing_scenario_file_is_reported() {
        let config = SandboxConfig {
            scenario_path: Some("does/not/exist.json".into()),
            ..SandboxConfig::default()
        };
        let err = load_scenario_source(&config).expect_err("err");
        assert!(matches!(err, SandboxError::ReadScenario { .. }));
        assert!(err.to_string().contains("does/not/exist.json"));
    }

    #[test]
    fn idle_scenario_keeps_positions_and_stays_quiet() {
        let raw = r#"{
            "name": "tiny",
            "width": 64,
            "height": 64,
            "entities": [
                { "name": "hero", "kind": "hero", "xy": { "x": 0, "y": 0 }, "width": 16, "height": 16 }
            ]
        }"#;
        let config = SandboxConfig {
            ticks: 3,
            ..SandboxConfig::default()
        };
        let summary = run_scenario(&config, raw).expect("run");
        assert_eq!(summary.final_positions, vec![("hero".to_string(), Point::ZERO)]);
        assert_eq!(summary.collision_events, 0);
    }
}
