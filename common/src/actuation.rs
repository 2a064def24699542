use crate::{
    action::{ModeToken, Origin, Request, ScheduleForm},
    schedule::{Schedule, ScheduleError, Toggle},
    state::State,
};

/// What an action does to the persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing to persist or transmit.
    Unchanged,
    /// Transmit first (if any), then persist `state` in one write.
    Commit {
        state: State,
        transmit: Option<ModeToken>,
    },
    /// The action name is not recognised.
    Ignored(String),
}

impl Plan {
    fn commit(current: &State, next: State, transmit: Option<ModeToken>) -> Self {
        if transmit.is_none() && *current == next {
            Self::Unchanged
        } else {
            Self::Commit {
                state: next,
                transmit,
            }
        }
    }
}

/// Decides how `request` changes `current`.
///
/// A locked state (`override_lock`) blocks scheduler-driven on/off changes;
/// interactive callers always pass. An interactive on/off outside manual mode
/// locks out the schedule.
pub fn plan(current: &State, request: &Request, origin: Origin) -> Result<Plan, ScheduleError> {
    let can_change = !current.override_lock || origin.is_authoritative();
    let mut next = current.clone();

    let transmit = match request {
        Request::Calibrate => {
            next.running = !next.running;
            None
        }
        Request::On | Request::Off => {
            let direction = if *request == Request::On {
                Toggle::On
            } else {
                Toggle::Off
            };

            if !current.manual && origin.is_authoritative() {
                next.override_lock = true;
            }

            let wants_on = direction == Toggle::On;
            if can_change && wants_on != current.running {
                next.running = wants_on;
                Some(ModeToken::new(&current.op_mode, direction))
            } else {
                None
            }
        }
        Request::ToggleLock => {
            next.override_lock = !next.override_lock;
            None
        }
        Request::Schedule(form) => {
            apply_schedule_form(&mut next, form)?;
            None
        }
        Request::Unknown(name) => return Ok(Plan::Ignored(name.clone())),
    };

    Ok(Plan::commit(current, next, transmit))
}

fn apply_schedule_form(state: &mut State, form: &ScheduleForm) -> Result<(), ScheduleError> {
    let schedule = form.sched.as_deref().unwrap_or_default();
    Schedule::parse(schedule)?;

    if let Some(mode) = form.selected_op_mode() {
        state.op_mode = mode.to_string();
    }
    state.manual = form.manual;
    state.schedule = schedule.trim().to_string();
    Ok(())
}
