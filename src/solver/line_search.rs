//! Backtracking line search along one joint.

use crate::SolveResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchOutcome {
    /// signed step that beat the baseline, if any
    pub accepted_step: Option<f64>,
    /// error at the accepted step, or the baseline when nothing was accepted
    pub error: f64,
    /// number of steps tried
    pub attempts: usize,
}

/// Try `step`, then `step * reduction`, `step * reduction^2`, ... until
/// the error drops strictly below `baseline` or `max_attempts` steps have
/// been tried.
///
/// `error_at(step)` evaluates the error with the step applied; a rejected
/// step is simply never committed, so the caller's joint stays where it
/// was.
pub fn backtracking_line_search(
    baseline: f64,
    step: f64,
    max_attempts: usize,
    reduction: f64,
    error_at: &mut dyn FnMut(f64) -> SolveResult<f64>,
) -> SolveResult<LineSearchOutcome> {
    let mut step = step;
    for attempt in 1..=max_attempts {
        let error = error_at(step)?;
        if error < baseline {
            return Ok(LineSearchOutcome {
                accepted_step: Some(step),
                error,
                attempts: attempt,
            });
        }
        step *= reduction;
    }
    Ok(LineSearchOutcome {
        accepted_step: None,
        error: baseline,
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{KinematicsError, SolveError};
    use approx::assert_relative_eq;

    #[test]
    fn test_first_step_accepted() {
        let mut error_at = |step: f64| -> SolveResult<f64> { Ok((0.1 - step).abs()) };
        let outcome = backtracking_line_search(0.1, 0.04, 5, 0.25, &mut error_at).unwrap();
        assert_eq!(outcome.accepted_step, Some(0.04));
        assert_relative_eq!(outcome.error, 0.06);
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn test_step_shrinks_until_improvement() {
        // 0.16 and 0.04 overshoot, 0.01 lands on the minimum
        let mut tried = vec![];
        let mut error_at = |step: f64| -> SolveResult<f64> {
            tried.push(step);
            Ok(if step > 0.035 { 0.05 } else { (0.01 - step).abs() })
        };
        let outcome = backtracking_line_search(0.01, 0.16, 5, 0.25, &mut error_at).unwrap();
        assert_eq!(outcome.accepted_step, Some(0.01));
        assert_eq!(outcome.attempts, 3);
        assert_relative_eq!(outcome.error, 0.);
        assert_eq!(tried, vec![0.16, 0.04, 0.01]);
    }

    #[test]
    fn test_equal_error_is_rejected() {
        let mut calls = 0;
        let mut flat = |_: f64| -> SolveResult<f64> {
            calls += 1;
            Ok(0.5)
        };
        let outcome = backtracking_line_search(0.5, 0.1, 5, 0.25, &mut flat).unwrap();
        assert_eq!(outcome.accepted_step, None);
        assert_eq!(outcome.error, 0.5);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(calls, 5);
    }

    #[test]
    fn test_negative_step() {
        let mut error_at = |step: f64| -> SolveResult<f64> { Ok((-0.05 - step).abs()) };
        let outcome = backtracking_line_search(0.05, -0.04, 5, 0.25, &mut error_at).unwrap();
        assert_eq!(outcome.accepted_step, Some(-0.04));
    }

    #[test]
    fn test_oracle_error_aborts() {
        let mut calls = 0;
        let mut failing = |_: f64| -> SolveResult<f64> {
            calls += 1;
            Err(KinematicsError::other("out of reach").into())
        };
        let err = backtracking_line_search(1., 0.1, 5, 0.25, &mut failing).unwrap_err();
        assert!(matches!(err, SolveError::Kinematics(_)));
        assert_eq!(calls, 1);
    }
}
