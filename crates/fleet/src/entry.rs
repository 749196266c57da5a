use std::sync::Arc;

use forge_relay::{HostedBot, RemoteBot};

/// A live, hosted bot: present in the registry ⇔ the single inbound
/// endpoint will dispatch updates for this credential.
#[derive(Clone)]
pub struct FleetEntry {
    pub owner_chat_id: i64,
    pub bot_record_id: i64,
    pub remote: Arc<dyn RemoteBot>,
    pub hosted: Arc<dyn HostedBot>,
}
