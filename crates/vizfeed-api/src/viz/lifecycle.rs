use thiserror::Error;

use vizfeed_types::viz::{VizPhase, VizSignal};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Signal {signal} is not valid in phase {phase:?}")]
pub struct IllegalTransition {
    pub phase: VizPhase,
    pub signal: &'static str,
}

fn signal_name(signal: &VizSignal) -> &'static str {
    match signal {
        VizSignal::Load => "Load",
        VizSignal::LibrariesLoaded => "LibrariesLoaded",
        VizSignal::Execute => "Execute",
        VizSignal::Running => "Running",
        VizSignal::Failed { .. } => "Failed",
        VizSignal::Teardown => "Teardown",
        VizSignal::Disposed => "Disposed",
    }
}

/// Next phase for `signal` applied in `phase`.
///
/// `Teardown` is accepted from every phase except `Idle` and `TearingDown`.
/// A library failure is reported as `Failed` from `LoadingLibrary` as well.
pub fn transition(phase: VizPhase, signal: &VizSignal) -> Result<VizPhase, IllegalTransition> {
    use VizPhase::*;

    let next = match (phase, signal) {
        (Idle, VizSignal::Load) => LoadingLibrary,
        (LoadingLibrary, VizSignal::LibrariesLoaded) => Ready,
        (Ready, VizSignal::Execute) => Executing,
        (Executing, VizSignal::Running) => Running,
        (LoadingLibrary | Executing | Running, VizSignal::Failed { .. }) => Errored,
        (LoadingLibrary | Ready | Executing | Running | Errored, VizSignal::Teardown) => TearingDown,
        (TearingDown, VizSignal::Disposed) => Idle,
        _ => {
            return Err(IllegalTransition {
                phase,
                signal: signal_name(signal),
            });
        }
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use VizPhase::*;

    fn run(signals: &[VizSignal]) -> Result<VizPhase, IllegalTransition> {
        signals.iter().try_fold(Idle, |phase, signal| transition(phase, signal))
    }

    #[test]
    fn happy_path_returns_to_idle() {
        let phase = run(&[
            VizSignal::Load,
            VizSignal::LibrariesLoaded,
            VizSignal::Execute,
            VizSignal::Running,
            VizSignal::Teardown,
            VizSignal::Disposed,
        ])
        .unwrap();
        assert_eq!(phase, Idle);
    }

    #[test]
    fn script_failure_is_errored_and_can_tear_down() {
        let phase = run(&[
            VizSignal::Load,
            VizSignal::LibrariesLoaded,
            VizSignal::Execute,
            VizSignal::Failed {
                message: "Globe is not a constructor".into(),
            },
        ])
        .unwrap();
        assert_eq!(phase, Errored);
        assert_eq!(transition(phase, &VizSignal::Teardown).unwrap(), TearingDown);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        assert!(transition(Idle, &VizSignal::Execute).is_err());
        assert!(transition(LoadingLibrary, &VizSignal::Running).is_err());
        assert!(transition(Running, &VizSignal::Load).is_err());
        assert!(transition(Idle, &VizSignal::Teardown).is_err());
        let err = transition(Ready, &VizSignal::Disposed).unwrap_err();
        assert_eq!(err.phase, Ready);
        assert_eq!(err.signal, "Disposed");
    }

    #[test]
    fn teardown_allowed_from_every_active_phase() {
        for phase in [LoadingLibrary, Ready, Executing, Running, Errored] {
            assert_eq!(transition(phase, &VizSignal::Teardown).unwrap(), TearingDown);
        }
    }
}
