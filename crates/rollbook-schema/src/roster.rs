//! TOML roster files for bulk promotion.
//!
//! A roster lists the promotions for one action, e.g. moving a whole class
//! into the next session. Entry order is significant: auto-assigned roll
//! numbers follow submission order.

use crate::requests::PromotionRequest;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read roster file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse roster: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported roster_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("roster contains no promotions")]
    Empty,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RosterV1 {
    pub roster_version: u32,
    #[serde(rename = "promote")]
    pub promotions: Vec<RosterEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RosterEntry {
    pub enrollment_id: String,
    pub session: String,
    pub class: String,
    pub section: String,
    #[serde(default)]
    pub roll_no: Option<String>,
}

impl RosterV1 {
    /// Convert the roster into promotion requests, preserving order.
    pub fn to_requests(&self) -> Vec<PromotionRequest> {
        self.promotions
            .iter()
            .map(|e| PromotionRequest {
                enrollment_id: e.enrollment_id.clone().into(),
                session_id: e.session.clone().into(),
                class_id: e.class.clone().into(),
                section_id: e.section.clone().into(),
                roll_no: e.roll_no.clone(),
            })
            .collect()
    }
}

pub fn parse_roster_str(input: &str) -> Result<RosterV1, RosterError> {
    let roster: RosterV1 = toml::from_str(input)?;
    if roster.roster_version != 1 {
        return Err(RosterError::UnsupportedVersion(roster.roster_version));
    }
    if roster.promotions.is_empty() {
        return Err(RosterError::Empty);
    }
    Ok(roster)
}

pub fn parse_roster_file(path: impl AsRef<Path>) -> Result<RosterV1, RosterError> {
    let content = fs::read_to_string(path)?;
    parse_roster_str(&content)
}
