//! Everything one level's AI needs: both tile graphs, the message bus and
//! every enemy controller, advanced together one tick at a time.
//!
//! Controllers update in ascending [`BodyId`] order. Telegrams an enemy sends
//! are delivered before the next enemy runs, so the tick is deterministic.

use std::collections::BTreeMap;

use bevy::prelude::*;
use micromegas_tracing::prelude::*;
use micromegas_tracing::prelude::{debug, info, warn};

use super::behavior::EnemySpec;
use super::controller::{EnemyController, Transition};
use super::messages::{MessageBus, MessageKind, Telegram};
use super::tile_graph::GravityGraphs;
use super::world::{BodyId, EnemyBody, MotionIntentSink, RayCastWorld, TargetBody, TileLookup};
use crate::components::Facing;
use crate::error::AiError;
use crate::resources::AiTuning;

/// What happened during one tick, for whoever reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub transitions: Vec<Transition>,
    /// Telegrams sent by enemies this tick, in send order.
    pub telegrams: Vec<Telegram>,
}

#[derive(Resource, Debug)]
pub struct Simulation {
    graphs: GravityGraphs,
    bus: MessageBus,
    controllers: BTreeMap<BodyId, EnemyController>,
    tuning: AiTuning,
    ticks: u64,
}

impl Simulation {
    #[span_fn]
    pub fn new(tiles: &impl TileLookup, tuning: AiTuning) -> Self {
        let graphs = GravityGraphs::build(tiles);
        info!(
            "AI simulation ready ({}x{} tiles)",
            tiles.width(),
            tiles.height()
        );
        Self {
            graphs,
            bus: MessageBus::new(),
            controllers: BTreeMap::new(),
            tuning,
            ticks: 0,
        }
    }

    pub fn graphs(&self) -> &GravityGraphs {
        &self.graphs
    }

    pub fn tuning(&self) -> &AiTuning {
        &self.tuning
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn controller(&self, id: BodyId) -> Option<&EnemyController> {
        self.controllers.get(&id)
    }

    pub fn controller_mut(&mut self, id: BodyId) -> Option<&mut EnemyController> {
        self.controllers.get_mut(&id)
    }

    pub fn controllers(&self) -> impl Iterator<Item = &EnemyController> {
        self.controllers.values()
    }

    /// Create a controller for `id`. Mobile enemies listen for backup
    /// requests. Spawning an existing id replaces its controller.
    pub fn spawn(&mut self, id: BodyId, spec: EnemySpec, facing: Facing) {
        let controller = EnemyController::new(id, spec, facing, &self.tuning);
        if spec.answers_backup() {
            self.bus.register(MessageKind::BackupRequest, id);
        }
        if self.controllers.insert(id, controller).is_some() {
            warn!("enemy {:?} respawned; previous controller dropped", id);
        }
        debug!("enemy {:?} spawned as {:?}", id, spec);
    }

    pub fn despawn(&mut self, id: BodyId) -> Option<EnemyController> {
        self.bus.unregister(id);
        self.controllers.remove(&id)
    }

    /// Whether `id` may flip its gravity now. Unknown enemies have no attack
    /// in progress and are always allowed.
    pub fn request_flip(&self, id: BodyId) -> bool {
        self.controllers.get(&id).is_none_or(|c| c.request_flip())
    }

    /// Post a telegram from outside the AI and deliver it right away.
    pub fn broadcast(&mut self, telegram: Telegram) -> usize {
        self.bus.post(telegram);
        self.dispatch()
    }

    /// Deliver every pending telegram in FIFO order. Returns how many
    /// deliveries were handled.
    fn dispatch(&mut self) -> usize {
        let mut handled = 0;
        while let Some(telegram) = self.bus.pop() {
            for listener in self.bus.recipients(&telegram) {
                match self.controllers.get_mut(&listener) {
                    Some(controller) => {
                        if controller.handle_message(&telegram) {
                            handled += 1;
                        }
                    }
                    None => warn!("telegram for unknown enemy {:?}", listener),
                }
            }
        }
        handled
    }

    /// Advance every controller one tick.
    ///
    /// `bodies` holds this tick's snapshot of each enemy body. Controllers
    /// without a snapshot are skipped. An invalid state dispatch aborts the
    /// tick.
    #[span_fn]
    pub fn tick(
        &mut self,
        world: &dyn RayCastWorld,
        bodies: &[EnemyBody],
        target: &TargetBody,
        sink: &mut dyn MotionIntentSink,
    ) -> Result<TickReport, AiError> {
        self.ticks += 1;
        let mut report = TickReport::default();

        let ids: Vec<BodyId> = self.controllers.keys().copied().collect();
        for id in ids {
            let Some(body) = bodies.iter().find(|b| b.id == id) else {
                warn!("no body snapshot for enemy {:?}", id);
                continue;
            };
            let Some(controller) = self.controllers.get_mut(&id) else {
                continue;
            };
            let output = controller.update(&self.graphs, world, body, target, &self.tuning)?;
            sink.submit(id, output.intent);
            for telegram in output.outbox {
                report.telegrams.push(telegram);
                self.bus.post(telegram);
            }
            self.dispatch();
        }

        for controller in self.controllers.values_mut() {
            report.transitions.extend(controller.take_transitions());
        }

        imetric!("ai_active_enemies", "count", self.controllers.len() as u64);
        imetric!("ai_transitions", "count", report.transitions.len() as u64);
        imetric!("ai_backup_requests", "count", report.telegrams.len() as u64);
        Ok(report)
    }
}
