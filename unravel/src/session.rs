//! Achievement execution state machine.
//!
//! One `achieve` call moves through `Running → {Succeeded | Classifying →
//! Fixing → Running}` until the action succeeds or a fatal condition stops it.
//! Retry state (attempts left, root causes already fixed) lives on the stack
//! of that call, so nested and independent calls never share it.

use std::collections::HashSet;

use tracing::{Dispatch, info, warn};

use crate::core::classifier::classify_first;
use crate::core::registry::{Fix, Registry};
use crate::core::types::FixableError;
use crate::error::UnravelError;
use crate::io::config::UnravelConfig;
use crate::io::exec::Exec;

/// Knowledge base plus the settings and logging dispatch used to achieve goals.
///
/// Populate it through the registration methods in [`crate::dsl`], then call
/// [`Session::achieve`].
#[derive(Debug)]
pub struct Session {
    registry: Registry,
    config: UnravelConfig,
    dispatch: Dispatch,
}

/// Result of running an achievement's action once.
#[derive(Debug)]
enum Attempt {
    Succeeded,
    Fixable(FixableError),
}

impl Default for Session {
    fn default() -> Self {
        Self::new(UnravelConfig::default())
    }
}

impl Session {
    /// Create a session logging to the dispatcher that is current at construction.
    pub fn new(config: UnravelConfig) -> Self {
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        Self::with_dispatch(config, dispatch)
    }

    pub fn with_dispatch(config: UnravelConfig, dispatch: Dispatch) -> Self {
        Self {
            registry: Registry::new(),
            config,
            dispatch,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn config(&self) -> &UnravelConfig {
        &self.config
    }

    /// Subprocess helper using this session's exec settings.
    pub fn exec(&self) -> Exec {
        Exec::new(self.config().exec.clone())
    }

    /// Achieve `name`, fixing recognized failures and retrying.
    ///
    /// Returns `Ok(true)` once the action succeeds, so an action can delegate
    /// with `Ok(session.achieve(..)?)`. Every error means a human has to step in.
    pub fn achieve(&self, name: &str, args: &[String]) -> Result<bool, UnravelError> {
        tracing::dispatcher::with_default(&self.dispatch, || self.run_achievement(name, args))
    }

    fn run_achievement(&self, name: &str, args: &[String]) -> Result<bool, UnravelError> {
        self.warn_inconsistencies();

        let max_retries = self.config.max_retries.max(1);
        let mut retries_left = max_retries;
        let mut fixed_causes: HashSet<String> = HashSet::new();

        loop {
            let attempt = max_retries - retries_left + 1;
            info!(achievement = name, attempt, max_retries, "achieving");

            let fixable = match self.attempt(name, args)? {
                Attempt::Succeeded => return Ok(true),
                Attempt::Fixable(fixable) => fixable,
            };
            info!(achievement = name, symptom = %fixable.symptom, "symptom");

            let cause = self
                .registry
                .get_root_cause(&fixable.symptom)
                .ok_or_else(|| UnravelError::NoKnownRootCause {
                    symptom: fixable.symptom.clone(),
                })?;
            info!(achievement = name, cause, "cause");

            if !fixed_causes.insert(cause.to_string()) {
                return Err(UnravelError::SameCauseReoccurring {
                    cause: cause.to_string(),
                });
            }

            self.apply_fix(cause, &fixable)?;

            retries_left -= 1;
            if retries_left == 0 {
                return Err(UnravelError::RetriesExhausted {
                    achievement: name.to_string(),
                    attempts: max_retries,
                    symptom: fixable.symptom,
                });
            }
        }
    }

    /// Run the action once and classify its failure.
    fn attempt(&self, name: &str, args: &[String]) -> Result<Attempt, UnravelError> {
        let action = self.registry.get_achievement(name)?;
        if !action.arity().accepts(args.len()) {
            return Err(UnravelError::ArityMismatch {
                achievement: name.to_string(),
                expected: action.arity(),
                got: args.to_vec(),
            });
        }
        let context = self.registry.get_error_context(name)?;

        let error = match action.call(self, args) {
            Ok(true) => return Ok(Attempt::Succeeded),
            Ok(false) => return Err(UnravelError::UnexpectedResult(name.to_string())),
            Err(error) => error,
        };

        let Some(symptoms) = context.symptoms_for(&error.kind) else {
            return Err(UnravelError::NoErrorHandler {
                achievement: name.to_string(),
                kind: error.kind.clone(),
                source: error,
            });
        };

        match classify_first(&self.registry, symptoms, &error.text)? {
            Some(fixable) => Ok(Attempt::Fixable(fixable)),
            None => Err(UnravelError::Unclassified {
                achievement: name.to_string(),
                source: error,
            }),
        }
    }

    fn apply_fix(&self, cause: &str, fixable: &FixableError) -> Result<(), UnravelError> {
        match self.registry.get_fix(cause)? {
            Fix::Run(fix) => fix(self, fixable).map_err(|source| UnravelError::FixFailed {
                root_cause: cause.to_string(),
                source,
            }),
            Fix::Achieve(target) => self.achieve(target, &fixable.groups).map(|_| ()),
        }
    }

    fn warn_inconsistencies(&self) {
        let report = self.registry.consistency_report();
        if !report.unused_fixes.is_empty() {
            warn!(causes = ?report.unused_fixes, "unused fixes");
        }
        if !report.unhandled_causes.is_empty() {
            warn!(causes = ?report.unhandled_causes, "unhandled root causes");
        }
        if !report.unknown_symptoms.is_empty() {
            warn!(symptoms = ?report.unknown_symptoms, "unknown symptoms in error contexts");
        }
        if !report.unused_symptoms.is_empty() {
            warn!(symptoms = ?report.unused_symptoms, "unused symptoms");
        }
        if !report.unpatterned_symptoms.is_empty() {
            warn!(symptoms = ?report.unpatterned_symptoms, "symptoms without a pattern");
        }
        if !report.unreferenced_patterns.is_empty() {
            warn!(symptoms = ?report.unreferenced_patterns, "patterns no error context uses");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::Action;
    use crate::core::types::{ErrorContext, ErrorKind};
    use crate::core::types::Arity;
    use crate::test_support::{CapturedLogs, Step, counting_fix, recording, scripted};

    const KIND: &str = "ExecError";

    fn session(max_retries: u32) -> Session {
        Session::new(UnravelConfig {
            max_retries,
            ..UnravelConfig::default()
        })
    }

    #[test]
    fn injected_dispatch_does_not_change_outcome() {
        let mut s = Session::with_dispatch(UnravelConfig::default(), crate::logging::dispatch());
        let (action, calls) = scripted(vec![Step::raise(KIND, "git: not found"), Step::Succeed]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");
        s.symptom("no_git", "git: not found").expect("pattern");
        s.root_cause_for("no_git", "git_missing");
        let (fix, fixes) = counting_fix();
        s.fix_for("git_missing", fix).expect("fix");

        assert!(s.achieve("build", &[]).expect("achieve"));
        assert_eq!(calls.get(), 2);
        assert_eq!(fixes.get(), 1);
    }

    #[test]
    fn success_on_first_attempt() {
        let mut s = session(5);
        let (action, calls) = scripted(vec![Step::Succeed]);
        s.achievement("build", ErrorContext::new(), action)
            .expect("register");
        assert!(s.achieve("build", &[]).expect("achieve"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retry_bound_attempts_exactly_max_retries() {
        let mut s = session(3);
        // A different cause on every attempt keeps cycle detection out of the way.
        let (action, calls) = scripted(vec![
            Step::raise(KIND, "cause_a"),
            Step::raise(KIND, "cause_b"),
            Step::raise(KIND, "cause_c"),
            Step::Succeed,
        ]);
        s.achievement("build", ErrorContext::new().on(KIND, ["a", "b", "c"]), action)
            .expect("register");
        let mut fix_counters = Vec::new();
        for name in ["a", "b", "c"] {
            s.symptom(name, &format!("cause_{name}")).expect("pattern");
            s.root_cause_for(name, &format!("{name}_cause"));
            let (fix, fixes) = counting_fix();
            s.fix_for(&format!("{name}_cause"), fix).expect("fix");
            fix_counters.push(fixes);
        }

        let err = s.achieve("build", &[]).expect_err("exhausted");
        assert!(matches!(
            err,
            UnravelError::RetriesExhausted { attempts: 3, ref symptom, .. } if symptom == "c"
        ));
        assert_eq!(calls.get(), 3);
        assert!(fix_counters.iter().all(|fixes| fixes.get() == 1));
    }

    #[test]
    fn reoccurring_cause_stops_on_second_attempt() {
        let mut s = session(5);
        let (action, calls) = scripted(vec![Step::raise(KIND, "git: not found")]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");
        s.symptom("no_git", "git: not found").expect("pattern");
        s.root_cause_for("no_git", "git_missing");
        let (fix, fixes) = counting_fix();
        s.fix_for("git_missing", fix).expect("fix");

        let err = s.achieve("build", &[]).expect_err("reoccurring");
        assert!(matches!(
            err,
            UnravelError::SameCauseReoccurring { ref cause } if cause == "git_missing"
        ));
        assert_eq!(calls.get(), 2);
        assert_eq!(fixes.get(), 1);
    }

    #[test]
    fn first_matching_symptom_wins() {
        let mut s = session(5);
        let (action, _calls) = scripted(vec![Step::raise(KIND, "git: not found"), Step::Succeed]);
        s.achievement("build", ErrorContext::new().on(KIND, ["a", "b"]), action)
            .expect("register");
        s.symptom("a", "not found").expect("pattern");
        s.symptom("b", "git").expect("pattern");
        s.root_cause_for("a", "cause_a");
        s.root_cause_for("b", "cause_b");
        let (fix_a, fixes_a) = counting_fix();
        let (fix_b, fixes_b) = counting_fix();
        s.fix_for("cause_a", fix_a).expect("fix a");
        s.fix_for("cause_b", fix_b).expect("fix b");

        assert!(s.achieve("build", &[]).expect("achieve"));
        assert_eq!(fixes_a.get(), 1);
        assert_eq!(fixes_b.get(), 0);
    }

    #[test]
    fn unknown_error_kind_fails_without_fixing() {
        let mut s = session(5);
        let (action, calls) = scripted(vec![Step::raise("IoError", "disk full")]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");
        s.symptom("no_git", "disk full").expect("pattern");
        s.root_cause_for("no_git", "git_missing");
        let (fix, fixes) = counting_fix();
        s.fix_for("git_missing", fix).expect("fix");

        let err = s.achieve("build", &[]).expect_err("unhandled kind");
        assert!(matches!(
            err,
            UnravelError::NoErrorHandler { ref kind, .. } if *kind == ErrorKind::new("IoError")
        ));
        assert_eq!(calls.get(), 1);
        assert_eq!(fixes.get(), 0);
    }

    #[test]
    fn unmatched_error_is_reraised_unchanged() {
        let mut s = session(5);
        let (action, _calls) = scripted(vec![Step::raise(KIND, "segfault")]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");
        s.symptom("no_git", "git: not found").expect("pattern");

        let err = s.achieve("build", &[]).expect_err("unclassified");
        match err {
            UnravelError::Unclassified { source, .. } => {
                assert_eq!(source.kind, ErrorKind::EXEC);
                assert_eq!(source.message, "segfault");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn symptom_without_root_cause_fails() {
        let mut s = session(5);
        let (action, _calls) = scripted(vec![Step::raise(KIND, "git: not found")]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");
        s.symptom("no_git", "git: not found").expect("pattern");

        let err = s.achieve("build", &[]).expect_err("no cause");
        assert!(matches!(err, UnravelError::NoKnownRootCause { ref symptom } if symptom == "no_git"));
        assert!(err.is_recovery_exhaustion());
    }

    #[test]
    fn cause_without_fix_fails() {
        let mut s = session(5);
        let (action, _calls) = scripted(vec![Step::raise(KIND, "git: not found")]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");
        s.symptom("no_git", "git: not found").expect("pattern");
        s.root_cause_for("no_git", "git_missing");

        let err = s.achieve("build", &[]).expect_err("no fix");
        assert!(matches!(err, UnravelError::MissingFix(ref cause) if cause == "git_missing"));
    }

    #[test]
    fn symptom_without_pattern_fails() {
        let mut s = session(5);
        let (action, _calls) = scripted(vec![Step::raise(KIND, "git: not found")]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");

        let err = s.achieve("build", &[]).expect_err("unregistered");
        assert!(matches!(err, UnravelError::UnregisteredError { .. }));
    }

    #[test]
    fn false_result_is_a_contract_violation() {
        let mut s = session(5);
        let (action, calls) = scripted(vec![Step::ReturnFalse]);
        s.achievement("build", ErrorContext::new(), action)
            .expect("register");
        let err = s.achieve("build", &[]).expect_err("false");
        assert!(matches!(err, UnravelError::UnexpectedResult(_)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn arity_mismatch_fails_before_running() {
        let mut s = session(5);
        let (action, calls) = scripted(vec![Step::Succeed]);
        s.achievement("build", ErrorContext::new(), action)
            .expect("register");
        let err = s
            .achieve("build", &["extra".to_string()])
            .expect_err("arity");
        assert!(matches!(err, UnravelError::ArityMismatch { .. }));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn missing_achievement_and_context_fail() {
        let mut s = session(5);
        assert!(matches!(
            s.achieve("nope", &[]),
            Err(UnravelError::NoSuchAchievement(_))
        ));

        s.registry_mut()
            .add_achievement("bare", Action::new(|_| Ok(true)))
            .expect("register");
        assert!(matches!(
            s.achieve("bare", &[]),
            Err(UnravelError::NoErrorContext(_))
        ));
    }

    #[test]
    fn failing_fix_is_reported_with_its_cause() {
        let mut s = session(5);
        let (action, _calls) = scripted(vec![Step::raise(KIND, "git: not found")]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");
        s.symptom("no_git", "git: not found").expect("pattern");
        s.root_cause_for("no_git", "git_missing");
        s.fix_for(
            "git_missing",
            Fix::run(|_, _| Err(anyhow::anyhow!("package manager offline"))),
        )
        .expect("fix");

        let err = s.achieve("build", &[]).expect_err("fix failed");
        assert!(matches!(err, UnravelError::FixFailed { ref root_cause, .. } if root_cause == "git_missing"));
    }

    #[test]
    fn nested_failure_can_be_handled_by_the_outer_context() {
        let mut s = session(5);
        s.achievement(
            "outer",
            ErrorContext::new().on(ErrorKind::HUMAN_INTERVENTION, ["no_inner"]),
            Action::new(|session| Ok(session.achieve("inner", &[])?)),
        )
        .expect("register outer");
        s.symptom("no_inner", "No such achievement").expect("pattern");

        let err = s.achieve("outer", &[]).expect_err("no cause");
        assert!(matches!(err, UnravelError::NoKnownRootCause { .. }));
    }

    #[test]
    fn fixed_causes_are_tracked_per_call() {
        let mut s = session(5);
        let (action, calls) = scripted(vec![
            Step::raise(KIND, "git: not found"),
            Step::Succeed,
            Step::raise(KIND, "git: not found"),
            Step::Succeed,
        ]);
        s.achievement("build", ErrorContext::new().on(KIND, ["no_git"]), action)
            .expect("register");
        s.symptom("no_git", "git: not found").expect("pattern");
        s.root_cause_for("no_git", "git_missing");
        let (fix, fixes) = counting_fix();
        s.fix_for("git_missing", fix).expect("fix");

        assert!(s.achieve("build", &[]).expect("first call"));
        assert!(s.achieve("build", &[]).expect("second call"));
        assert_eq!(calls.get(), 4);
        assert_eq!(fixes.get(), 2);
    }

    #[test]
    fn variadic_action_accepts_any_argument_count() {
        let mut s = session(5);
        let (action, seen) = recording(Arity::Variadic);
        s.achievement("install", ErrorContext::new(), action)
            .expect("register");

        assert!(s.achieve("install", &[]).expect("no args"));
        assert!(
            s.achieve("install", &["git".to_string(), "2.44".to_string()])
                .expect("two args")
        );
        assert_eq!(
            *seen.borrow(),
            vec![vec![], vec!["git".to_string(), "2.44".to_string()]]
        );
    }

    #[test]
    fn fix_forwards_every_captured_group_to_variadic_target() {
        let mut s = session(5);
        let (build, calls) = scripted(vec![
            Step::raise(KIND, "need git 2.44 from apt"),
            Step::Succeed,
        ]);
        s.achievement("build", ErrorContext::new().on(KIND, ["outdated"]), build)
            .expect("register build");
        let (install, seen) = recording(Arity::Variadic);
        s.quickfix(
            "outdated",
            r"need (\w+) ([\d.]+) from (\w+)",
            "install",
            ErrorContext::new(),
            install,
        )
        .expect("quickfix");

        assert!(s.achieve("build", &[]).expect("achieve"));
        assert_eq!(calls.get(), 2);
        assert_eq!(
            *seen.borrow(),
            vec![vec!["git".to_string(), "2.44".to_string(), "apt".to_string()]]
        );
    }

    #[test]
    fn consistency_warnings_are_logged_once_per_call() {
        let logs = CapturedLogs::default();
        let mut s = Session::with_dispatch(UnravelConfig::default(), logs.dispatch());
        let (action, _calls) = scripted(vec![Step::Succeed]);
        s.achievement("build", ErrorContext::new(), action)
            .expect("register");
        let (fix, _fixes) = counting_fix();
        s.fix_for("stale_cache", fix).expect("fix");

        assert!(s.achieve("build", &[]).expect("achieve"));
        let contents = logs.contents();
        assert_eq!(contents.matches("unused fixes").count(), 1, "{contents}");
        assert!(contents.contains("stale_cache"));
    }
}
