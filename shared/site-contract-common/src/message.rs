use alloy::primitives::Address;
use serde::{de, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContractMessageType {
    CreateContract,
    UpdateContract,
}

impl ContractMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractMessageType::CreateContract => "create_contract",
            ContractMessageType::UpdateContract => "update_contract",
        }
    }
}

impl std::fmt::Display for ContractMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract queue message.
///
/// Only `type` is required on the wire. `update_contract` additionally needs
/// `contractAddress` and `cid`; that is checked by the consumer, not here, so a
/// malformed update still decodes and can be logged with its context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractMessage {
    #[serde(rename = "type")]
    pub message_type: ContractMessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub contract_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

impl ContractMessage {
    /// Bare `create_contract` request; fill the optional fields directly.
    pub fn create() -> Self {
        Self {
            message_type: ContractMessageType::CreateContract,
            cid: None,
            contract_address: None,
            site_id: None,
            domain: None,
            user_id: None,
            org_id: None,
        }
    }

    pub fn update(contract_address: Address, cid: impl Into<String>) -> Self {
        Self {
            message_type: ContractMessageType::UpdateContract,
            cid: Some(cid.into()),
            contract_address: Some(contract_address),
            ..Self::create()
        }
    }

    /// `update_contract` follow-up for a freshly created contract. Carries the
    /// new address and `cid` plus every passthrough field of the originating
    /// message.
    pub fn follow_up_update(
        original: &ContractMessage,
        contract_address: Address,
        cid: impl Into<String>,
    ) -> Self {
        Self {
            site_id: original.site_id.clone(),
            domain: original.domain.clone(),
            user_id: original.user_id.clone(),
            org_id: original.org_id.clone(),
            ..Self::update(contract_address, cid)
        }
    }

    pub fn from_slice(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// `""` and `null` decode as absent; anything else must be a valid address.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map(Some).map_err(de::Error::custom)
        }
        _ => Ok(None),
    }
}
