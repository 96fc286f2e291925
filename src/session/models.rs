//! Session records and read models.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::device::{self, DeviceFingerprint, DeviceType};

/// Network attributes captured at session creation. Geo fields are resolved
/// by the edge; this core only stores them.
#[derive(Clone, Debug, Default)]
pub struct NetworkInfo {
    pub ip: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// One signed-in device. The raw session token never lands here; only its
/// SHA-256 hash is kept for lookups.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub(crate) token_hash: Vec<u8>,
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
    pub ip: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub created_at_ms: u64,
    pub last_active_at_ms: u64,
    pub revoked_at_ms: Option<u64>,
}

impl Session {
    /// Active means neither revoked nor past the registry TTL.
    pub(crate) fn is_active(&self, now_ms: u64, ttl_ms: u64) -> bool {
        self.revoked_at_ms.is_none() && now_ms < self.created_at_ms.saturating_add(ttl_ms)
    }
}

/// Read model for the sessions list. `is_current` is computed per caller at
/// read time and never stored.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub device_type: DeviceType,
    pub device_icon: &'static str,
    pub browser: String,
    pub os: String,
    pub device: String,
    pub ip: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub created_at_ms: u64,
    pub last_active_at_ms: u64,
    pub is_current: bool,
}

impl SessionView {
    pub(crate) fn from_session(session: &Session, is_current: bool) -> Self {
        let fingerprint = DeviceFingerprint {
            device_type: session.device_type,
            browser: session.browser.clone(),
            os: session.os.clone(),
            raw: None,
        };
        Self {
            id: session.id,
            device_type: session.device_type,
            device_icon: session.device_type.icon(),
            browser: session.browser.clone(),
            os: session.os.clone(),
            device: device::description(&fingerprint),
            ip: session.ip.clone(),
            country: session.country.clone(),
            city: session.city.clone(),
            created_at_ms: session.created_at_ms,
            last_active_at_ms: session.last_active_at_ms,
            is_current,
        }
    }
}
