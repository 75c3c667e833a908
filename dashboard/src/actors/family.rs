//! FamilyActor - in-memory family rosters
//!
//! Owns guardians, children and child reachability for every family the
//! dashboard knows about. The orchestrator never mutates a roster; it asks
//! for a `Family` snapshot and works from that.

use async_trait::async_trait;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde::Deserialize;
use shared_types::{Family, Guardian, Recipient};
use std::collections::BTreeMap;
use std::path::Path;

/// Actor that owns family rosters
#[derive(Debug, Default)]
pub struct FamilyActor;

/// Arguments for spawning FamilyActor
#[derive(Debug, Clone, Default)]
pub struct FamilyArguments {
    /// Rosters loaded before the actor accepts messages
    pub seed: Vec<Family>,
}

/// State for FamilyActor
pub struct FamilyState {
    families: BTreeMap<String, Family>,
}

// ============================================================================
// Messages
// ============================================================================

/// Messages handled by FamilyActor
#[derive(Debug)]
pub enum FamilyMsg {
    CreateFamily {
        family_id: String,
        name: String,
        founder: Guardian,
        reply: RpcReplyPort<Result<Family, MembershipError>>,
    },
    GetFamily {
        family_id: String,
        reply: RpcReplyPort<Result<Family, MembershipError>>,
    },
    ListFamilies {
        reply: RpcReplyPort<Vec<Family>>,
    },
    AddGuardian {
        family_id: String,
        guardian: Guardian,
        reply: RpcReplyPort<Result<Family, MembershipError>>,
    },
    /// Fails when it would leave the family without a guardian
    RemoveGuardian {
        family_id: String,
        guardian_id: String,
        reply: RpcReplyPort<Result<Family, MembershipError>>,
    },
    AddChild {
        family_id: String,
        child: Recipient,
        reply: RpcReplyPort<Result<Family, MembershipError>>,
    },
    RemoveChild {
        family_id: String,
        child_id: String,
        reply: RpcReplyPort<Result<Family, MembershipError>>,
    },
    /// Presence update for one child
    SetReachability {
        family_id: String,
        child_id: String,
        reachable: bool,
        reply: RpcReplyPort<Result<Recipient, MembershipError>>,
    },
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    #[error("Family not found: {0}")]
    FamilyNotFound(String),

    #[error("Family already exists: {0}")]
    FamilyExists(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Member already in family: {0}")]
    DuplicateMember(String),

    #[error("Cannot remove the last guardian of family {0}")]
    LastGuardian(String),
}

// ============================================================================
// Seed File
// ============================================================================

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    families: Vec<SeedFamily>,
}

#[derive(Debug, Deserialize)]
struct SeedFamily {
    id: String,
    name: String,
    #[serde(default)]
    guardians: Vec<SeedMember>,
    #[serde(default)]
    children: Vec<SeedMember>,
}

#[derive(Debug, Deserialize)]
struct SeedMember {
    id: String,
    display_name: String,
    #[serde(default)]
    reachable: bool,
}

/// Parse a TOML roster.
///
/// ```toml
/// [[families]]
/// id = "okafor"
/// name = "Okafor"
/// guardians = [{ id = "g-1", display_name = "Ngozi" }]
/// children = [{ id = "c-1", display_name = "Ada", reachable = true }]
/// ```
pub fn parse_seed(contents: &str) -> anyhow::Result<Vec<Family>> {
    let file: SeedFile = toml::from_str(contents)?;
    let mut seen = std::collections::HashSet::new();
    let mut families = Vec::with_capacity(file.families.len());

    for seed in file.families {
        if !seen.insert(seed.id.clone()) {
            anyhow::bail!("duplicate family id in roster: {}", seed.id);
        }
        if seed.guardians.is_empty() {
            anyhow::bail!("family {} has no guardians", seed.id);
        }
        let now = Utc::now();
        families.push(Family {
            id: seed.id,
            name: seed.name,
            guardians: seed
                .guardians
                .into_iter()
                .map(|g| Guardian::new(g.id, g.display_name))
                .collect(),
            children: seed
                .children
                .into_iter()
                .map(|c| Recipient {
                    last_seen: c.reachable.then_some(now),
                    reachable: c.reachable,
                    ..Recipient::new(c.id, c.display_name)
                })
                .collect(),
        });
    }
    Ok(families)
}

/// Read and parse a TOML roster from disk
pub fn load_seed(path: &Path) -> anyhow::Result<Vec<Family>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read roster {}: {e}", path.display()))?;
    parse_seed(&contents)
        .map_err(|e| anyhow::anyhow!("invalid roster {}: {e}", path.display()))
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for FamilyActor {
    type Msg = FamilyMsg;
    type State = FamilyState;
    type Arguments = FamilyArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            seeded = args.seed.len(),
            "FamilyActor starting"
        );

        let families = args
            .seed
            .into_iter()
            .map(|family| (family.id.clone(), family))
            .collect();
        Ok(FamilyState { families })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            FamilyMsg::CreateFamily {
                family_id,
                name,
                founder,
                reply,
            } => {
                let _ = reply.send(self.handle_create_family(family_id, name, founder, state));
            }
            FamilyMsg::GetFamily { family_id, reply } => {
                let result = state
                    .families
                    .get(&family_id)
                    .cloned()
                    .ok_or(MembershipError::FamilyNotFound(family_id));
                let _ = reply.send(result);
            }
            FamilyMsg::ListFamilies { reply } => {
                let _ = reply.send(state.families.values().cloned().collect());
            }
            FamilyMsg::AddGuardian {
                family_id,
                guardian,
                reply,
            } => {
                let result = with_family(state, &family_id, |family| {
                    if family.guardians.iter().any(|g| g.id == guardian.id) {
                        return Err(MembershipError::DuplicateMember(guardian.id.clone()));
                    }
                    tracing::info!(family_id = %family.id, guardian_id = %guardian.id, "Guardian added");
                    family.guardians.push(guardian);
                    Ok(family.clone())
                });
                let _ = reply.send(result);
            }
            FamilyMsg::RemoveGuardian {
                family_id,
                guardian_id,
                reply,
            } => {
                let result = with_family(state, &family_id, |family| {
                    let index = family
                        .guardians
                        .iter()
                        .position(|g| g.id == guardian_id)
                        .ok_or_else(|| MembershipError::MemberNotFound(guardian_id.clone()))?;
                    if family.guardians.len() == 1 {
                        return Err(MembershipError::LastGuardian(family.id.clone()));
                    }
                    family.guardians.remove(index);
                    tracing::info!(family_id = %family.id, guardian_id = %guardian_id, "Guardian removed");
                    Ok(family.clone())
                });
                let _ = reply.send(result);
            }
            FamilyMsg::AddChild {
                family_id,
                child,
                reply,
            } => {
                let result = with_family(state, &family_id, |family| {
                    if family.children.iter().any(|c| c.id == child.id) {
                        return Err(MembershipError::DuplicateMember(child.id.clone()));
                    }
                    tracing::info!(family_id = %family.id, child_id = %child.id, "Child added");
                    family.children.push(child);
                    Ok(family.clone())
                });
                let _ = reply.send(result);
            }
            FamilyMsg::RemoveChild {
                family_id,
                child_id,
                reply,
            } => {
                let result = with_family(state, &family_id, |family| {
                    let index = family
                        .children
                        .iter()
                        .position(|c| c.id == child_id)
                        .ok_or_else(|| MembershipError::MemberNotFound(child_id.clone()))?;
                    family.children.remove(index);
                    tracing::info!(family_id = %family.id, child_id = %child_id, "Child removed");
                    Ok(family.clone())
                });
                let _ = reply.send(result);
            }
            FamilyMsg::SetReachability {
                family_id,
                child_id,
                reachable,
                reply,
            } => {
                let result = with_family(state, &family_id, |family| {
                    let child = family
                        .children
                        .iter_mut()
                        .find(|c| c.id == child_id)
                        .ok_or_else(|| MembershipError::MemberNotFound(child_id.clone()))?;
                    child.reachable = reachable;
                    if reachable {
                        child.last_seen = Some(Utc::now());
                    }
                    tracing::debug!(child_id = %child.id, reachable, "Child presence updated");
                    Ok(child.clone())
                });
                let _ = reply.send(result);
            }
        }
        Ok(())
    }
}

impl FamilyActor {
    fn handle_create_family(
        &self,
        family_id: String,
        name: String,
        founder: Guardian,
        state: &mut FamilyState,
    ) -> Result<Family, MembershipError> {
        if state.families.contains_key(&family_id) {
            return Err(MembershipError::FamilyExists(family_id));
        }
        let family = Family {
            id: family_id.clone(),
            name,
            guardians: vec![founder],
            children: Vec::new(),
        };
        tracing::info!(family_id = %family_id, "Family created");
        state.families.insert(family_id, family.clone());
        Ok(family)
    }
}

fn with_family<T>(
    state: &mut FamilyState,
    family_id: &str,
    f: impl FnOnce(&mut Family) -> Result<T, MembershipError>,
) -> Result<T, MembershipError> {
    let family = state
        .families
        .get_mut(family_id)
        .ok_or_else(|| MembershipError::FamilyNotFound(family_id.to_string()))?;
    f(family)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convenience function to create a family
pub async fn create_family(
    families: &ActorRef<FamilyMsg>,
    family_id: String,
    name: String,
    founder: Guardian,
) -> Result<Result<Family, MembershipError>, ractor::RactorErr<FamilyMsg>> {
    ractor::call!(families, |reply| FamilyMsg::CreateFamily {
        family_id,
        name,
        founder,
        reply
    })
}

/// Convenience function to fetch one family
pub async fn get_family(
    families: &ActorRef<FamilyMsg>,
    family_id: String,
) -> Result<Result<Family, MembershipError>, ractor::RactorErr<FamilyMsg>> {
    ractor::call!(families, |reply| FamilyMsg::GetFamily { family_id, reply })
}

/// Convenience function to list all families
pub async fn list_families(
    families: &ActorRef<FamilyMsg>,
) -> Result<Vec<Family>, ractor::RactorErr<FamilyMsg>> {
    ractor::call!(families, |reply| FamilyMsg::ListFamilies { reply })
}

pub async fn add_guardian(
    families: &ActorRef<FamilyMsg>,
    family_id: String,
    guardian: Guardian,
) -> Result<Result<Family, MembershipError>, ractor::RactorErr<FamilyMsg>> {
    ractor::call!(families, |reply| FamilyMsg::AddGuardian {
        family_id,
        guardian,
        reply
    })
}

pub async fn remove_guardian(
    families: &ActorRef<FamilyMsg>,
    family_id: String,
    guardian_id: String,
) -> Result<Result<Family, MembershipError>, ractor::RactorErr<FamilyMsg>> {
    ractor::call!(families, |reply| FamilyMsg::RemoveGuardian {
        family_id,
        guardian_id,
        reply
    })
}

pub async fn add_child(
    families: &ActorRef<FamilyMsg>,
    family_id: String,
    child: Recipient,
) -> Result<Result<Family, MembershipError>, ractor::RactorErr<FamilyMsg>> {
    ractor::call!(families, |reply| FamilyMsg::AddChild {
        family_id,
        child,
        reply
    })
}

pub async fn remove_child(
    families: &ActorRef<FamilyMsg>,
    family_id: String,
    child_id: String,
) -> Result<Result<Family, MembershipError>, ractor::RactorErr<FamilyMsg>> {
    ractor::call!(families, |reply| FamilyMsg::RemoveChild {
        family_id,
        child_id,
        reply
    })
}

pub async fn set_reachability(
    families: &ActorRef<FamilyMsg>,
    family_id: String,
    child_id: String,
    reachable: bool,
) -> Result<Result<Recipient, MembershipError>, ractor::RactorErr<FamilyMsg>> {
    ractor::call!(families, |reply| FamilyMsg::SetReachability {
        family_id,
        child_id,
        reachable,
        reply
    })
}

// ============================================================================
// Tests
// ============================================================================
