use ractor::{Actor, ActorRef};
use shared_types::{EnvironmentReport, Family};
use std::sync::Arc;

use crate::actors::call_orchestrator::{
    CallOrchestratorActor, CallOrchestratorArguments, CallOrchestratorMsg, CallSlot,
};
use crate::actors::family::{FamilyActor, FamilyArguments, FamilyMsg};
use crate::capability::{CapabilityGate, ReportedEnvironment};
use crate::transport::CallTransport;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    orchestrator: ActorRef<CallOrchestratorMsg>,
    families: ActorRef<FamilyMsg>,
    environment: ReportedEnvironment,
}

impl AppState {
    /// Spawn the family store and the call orchestrator.
    pub async fn start(
        environment: EnvironmentReport,
        dev_hosts: Vec<String>,
        seed: Vec<Family>,
        transport: Arc<dyn CallTransport>,
    ) -> anyhow::Result<Self> {
        let environment = ReportedEnvironment::new(environment);

        let (families, _) = Actor::spawn(
            Some(format!("families:{}", ulid::Ulid::new())),
            FamilyActor,
            FamilyArguments { seed },
        )
        .await?;

        let (orchestrator, _) = Actor::spawn(
            Some(format!("call_orchestrator:{}", ulid::Ulid::new())),
            CallOrchestratorActor,
            CallOrchestratorArguments {
                gate: CapabilityGate::new(dev_hosts),
                probe: Arc::new(environment.clone()),
                transport,
                call_slot: CallSlot::new(),
            },
        )
        .await?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                orchestrator,
                families,
                environment,
            }),
        })
    }

    pub fn orchestrator(&self) -> ActorRef<CallOrchestratorMsg> {
        self.inner.orchestrator.clone()
    }

    pub fn families(&self) -> ActorRef<FamilyMsg> {
        self.inner.families.clone()
    }

    pub fn environment(&self) -> &ReportedEnvironment {
        &self.inner.environment
    }

    pub fn shutdown(&self) {
        self.inner.orchestrator.stop(None);
        self.inner.families.stop(None);
    }
}
