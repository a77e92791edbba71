use serde::{Deserialize, Serialize};

/// An operator's duty session. Either off duty with no vehicle, or on duty
/// with exactly one vehicle; the two fields can only change together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecord", into = "SessionRecord")]
pub struct OperatorSession {
    operator_id: String,
    operator_name: String,
    assigned_vehicle: Option<String>,
}

impl OperatorSession {
    #[must_use]
    pub fn off_duty(operator_id: impl Into<String>, operator_name: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            operator_name: operator_name.into(),
            assigned_vehicle: None,
        }
    }

    #[must_use]
    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    #[must_use]
    pub fn operator_name(&self) -> &str {
        &self.operator_name
    }

    #[must_use]
    pub fn assigned_vehicle(&self) -> Option<&str> {
        self.assigned_vehicle.as_deref()
    }

    #[must_use]
    pub const fn on_duty(&self) -> bool {
        self.assigned_vehicle.is_some()
    }

    /// The same operator, on duty with `vehicle_id`.
    #[must_use]
    pub fn with_vehicle(&self, vehicle_id: impl Into<String>) -> Self {
        Self { assigned_vehicle: Some(vehicle_id.into()), ..self.clone() }
    }

    /// The same operator, off duty. Identity is retained.
    #[must_use]
    pub fn released(&self) -> Self {
        Self { assigned_vehicle: None, ..self.clone() }
    }
}

/// Flat storage/wire shape of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    operator_id: String,
    operator_name: String,
    #[serde(default)]
    assigned_vehicle: Option<String>,
    #[serde(default)]
    on_duty: bool,
}

impl TryFrom<SessionRecord> for OperatorSession {
    type Error = String;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        let assigned_vehicle = record.assigned_vehicle.filter(|v| !v.is_empty());
        if record.on_duty != assigned_vehicle.is_some() {
            return Err(format!(
                "inconsistent session for {}: onDuty={} without matching vehicle",
                record.operator_id, record.on_duty
            ));
        }
        Ok(Self {
            operator_id: record.operator_id,
            operator_name: record.operator_name,
            assigned_vehicle,
        })
    }
}

impl From<OperatorSession> for SessionRecord {
    fn from(session: OperatorSession) -> Self {
        Self {
            on_duty: session.on_duty(),
            operator_id: session.operator_id,
            operator_name: session.operator_name,
            assigned_vehicle: session.assigned_vehicle,
        }
    }
}

/// Operator as held in storage, including the credential checked at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorRecord {
    pub operator_id: String,
    pub operator_name: String,
    pub password: String,
    #[serde(default)]
    pub assigned_vehicle: Option<String>,
}

impl OperatorRecord {
    /// The session view of this operator. The password never leaves the
    /// record.
    #[must_use]
    pub fn session(&self) -> OperatorSession {
        let session = OperatorSession::off_duty(&self.operator_id, &self.operator_name);
        match self.assigned_vehicle.as_deref().filter(|v| !v.is_empty()) {
            Some(vehicle_id) => session.with_vehicle(vehicle_id),
            None => session,
        }
    }
}

/// What the device keeps between reloads: who is logged in and their
/// current duty state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSession {
    pub session: OperatorSession,
    pub token: String,
}
