use std::fmt;

use crate::schedule::Toggle;

/// Op mode value submitted by the form when the mode should stay as is.
pub const NOOP_OP_MODE: &str = "noop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Web or API caller.
    Interactive,
    /// The background scheduler.
    Scheduler,
}

impl Origin {
    pub fn is_authoritative(self) -> bool {
        matches!(self, Self::Interactive)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleForm {
    pub opmode: Option<String>,
    pub manual: bool,
    pub sched: Option<String>,
}

impl ScheduleForm {
    /// Builds the form from urlencoded pairs. Repeated `sched` values are
    /// joined line by line; unrelated keys are dropped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut opmode: Option<Vec<String>> = None;
        let mut sched: Option<Vec<String>> = None;
        let mut manual = false;

        for (key, value) in pairs {
            match key.as_ref() {
                "opmode" => opmode.get_or_insert_with(Vec::new).push(value.into()),
                "sched" => sched.get_or_insert_with(Vec::new).push(value.into()),
                "manual" => manual = true,
                _ => {}
            }
        }

        Self {
            opmode: opmode.map(|values| values.concat().trim().to_string()),
            manual,
            sched: sched.map(|values| values.join("\n")),
        }
    }

    /// The op mode to commit, if the form changes it.
    pub fn selected_op_mode(&self) -> Option<&str> {
        self.opmode
            .as_deref()
            .filter(|mode| *mode != NOOP_OP_MODE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("action 'schedule' requires form fields")]
    MissingForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Calibrate,
    On,
    Off,
    ToggleLock,
    Schedule(ScheduleForm),
    Unknown(String),
}

impl Request {
    pub fn from_name(name: &str, form: Option<ScheduleForm>) -> Result<Self, RequestError> {
        let request = match name {
            "calibrate" => Self::Calibrate,
            "on" => Self::On,
            "off" => Self::Off,
            "togglelock" => Self::ToggleLock,
            "schedule" => Self::Schedule(form.ok_or(RequestError::MissingForm)?),
            other => Self::Unknown(other.to_string()),
        };
        Ok(request)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Calibrate => "calibrate",
            Self::On => "on",
            Self::Off => "off",
            Self::ToggleLock => "togglelock",
            Self::Schedule(_) => "schedule",
            Self::Unknown(name) => name.as_str(),
        }
    }
}

impl From<Toggle> for Request {
    fn from(toggle: Toggle) -> Self {
        match toggle {
            Toggle::On => Self::On,
            Toggle::Off => Self::Off,
        }
    }
}

/// Command token handed to the transmitter, `<OpMode>START` or `<OpMode>STOP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeToken(String);

impl ModeToken {
    pub fn new(op_mode: &str, direction: Toggle) -> Self {
        let postfix = match direction {
            Toggle::On => "START",
            Toggle::Off => "STOP",
        };
        Self(format!("{op_mode}{postfix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn maps_action_names() {
        assert_eq!(Request::from_name("calibrate", None), Ok(Request::Calibrate));
        assert_eq!(Request::from_name("on", None), Ok(Request::On));
        assert_eq!(Request::from_name("off", None), Ok(Request::Off));
        assert_eq!(Request::from_name("togglelock", None), Ok(Request::ToggleLock));
        assert_eq!(
            Request::from_name("reboot", None),
            Ok(Request::Unknown("reboot".to_string()))
        );
        assert_eq!(
            Request::from_name("schedule", None),
            Err(RequestError::MissingForm)
        );
    }

    #[test]
    fn form_joins_repeated_values() {
        let form = ScheduleForm::from_pairs([
            ("opmode", " HEAT72 "),
            ("sched", "0 8 weekday on"),
            ("sched", "0 18 weekday off"),
            ("manual", ""),
            ("submit", "save"),
        ]);

        assert_eq!(
            form,
            ScheduleForm {
                opmode: Some("HEAT72".to_string()),
                manual: true,
                sched: Some("0 8 weekday on\n0 18 weekday off".to_string()),
            }
        );
        assert_eq!(form.selected_op_mode(), Some("HEAT72"));
    }

    #[test]
    fn noop_op_mode_is_not_selected() {
        let form = ScheduleForm::from_pairs([("opmode", "noop")]);

        assert!(!form.manual);
        assert_eq!(form.sched, None);
        assert_eq!(form.selected_op_mode(), None);
    }

    #[test]
    fn mode_token_appends_direction() {
        assert_eq!(ModeToken::new("COOL74", Toggle::On).as_str(), "COOL74START");
        assert_eq!(ModeToken::new("COOL74", Toggle::Off).to_string(), "COOL74STOP");
    }
}
