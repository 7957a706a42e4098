use std::sync::Arc;

use anyhow::Result;

use crate::base::{behavior::*, module::*};
use crate::sim::log::Logger;
use crate::{debug, info};

use super::admission::{AdmissionFilter, EnqueueOutcome, LaneStage};
use super::arbiter::BackendArbiter;
use super::config::UncacheConfig;
use super::fanout::WritebackFanout;
use super::freelist::FreeList;
use super::request::{
    BackendRequest, BackendResponse, FaultReport, LoadCandidate, OrderedWriteback, Request,
    Writeback,
};
use super::rollback::{Rollback, RollbackCandidate, RollbackSelector};
use super::router::ResponseRouter;
use super::slot::{SlotInputs, SlotState, TransactionSlot};
use super::types::{AgeKey, Flush, OrderClass, SlotId};

/// Everything driven into the buffer for one cycle.
#[derive(Debug, Clone, Default)]
pub struct UncacheInputs {
    /// One optional submission per producer lane.
    pub lanes: Vec<Option<LoadCandidate>>,
    pub flush: Option<Flush>,
    /// Age at the head of program order when it is an ordered load; used one cycle later.
    pub head: Option<AgeKey>,
    pub backend_req_ready: bool,
    pub backend_resp: Option<BackendResponse>,
    pub ordered_ready: bool,
    /// One ready per unordered writeback port.
    pub unordered_ready: Vec<bool>,
}

impl UncacheInputs {
    /// No submissions, every consumer ready.
    pub fn idle(config: &UncacheConfig) -> Self {
        Self {
            lanes: vec![None; config.num_lanes],
            flush: None,
            head: None,
            backend_req_ready: true,
            backend_resp: None,
            ordered_ready: true,
            unordered_ready: vec![true; config.unordered_ports()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UncacheOutputs {
    /// Only reported when the channel accepted it.
    pub backend_req: Option<BackendRequest>,
    pub ordered_wb: Option<OrderedWriteback>,
    pub unordered_wb: Vec<Option<Writeback>>,
    /// Per lane, for the candidate that sat in stage 2 this cycle.
    pub enqueue: Vec<Option<EnqueueOutcome>>,
    /// Per lane, the age of an ordered load that was just given a slot.
    pub ordered_ack: Vec<Option<AgeKey>>,
    pub rollback: Option<Rollback>,
    pub fault: Option<FaultReport>,
}

impl UncacheOutputs {
    fn new(config: &UncacheConfig) -> Self {
        Self {
            unordered_wb: vec![None; config.unordered_ports()],
            enqueue: vec![None; config.num_lanes],
            ordered_ack: vec![None; config.num_lanes],
            ..Self::default()
        }
    }

    pub fn writebacks(&self) -> impl Iterator<Item = &Writeback> {
        self.ordered_wb
            .iter()
            .map(|wb| &wb.writeback)
            .chain(self.unordered_wb.iter().flatten())
    }
}

#[derive(Debug, Default)]
pub struct UncacheState {
    /// Head token as sampled last cycle.
    head_token: Option<AgeKey>,
}

/// Bounded tracker for uncached loads: slot pool, admission, channel arbitration, response
/// routing, writeback fan-out and rollback election, evaluated together once per cycle.
pub struct UncacheBuffer {
    base: ModuleBase<UncacheState, UncacheConfig>,
    slots: Vec<TransactionSlot>,
    free_list: FreeList,
    admission: AdmissionFilter,
    arbiter: BackendArbiter,
    router: ResponseRouter,
    fanout: WritebackFanout,
    rollback: RollbackSelector,
    logger: Arc<Logger>,
}

module!(UncacheBuffer, UncacheState, UncacheConfig,);

impl ModuleBehaviors for UncacheBuffer {
    /// Advance one cycle with nothing submitted and every outward handshake stalled.
    fn tick_one(&mut self) {
        let mut inputs = UncacheInputs::idle(self.conf());
        inputs.backend_req_ready = false;
        inputs.ordered_ready = false;
        inputs.unordered_ready.iter_mut().for_each(|ready| *ready = false);
        self.tick(&inputs);
    }

    fn reset(&mut self) {
        self.slots.iter_mut().for_each(TransactionSlot::reset);
        self.free_list.reset();
        self.admission.reset();
        self.arbiter.reset();
        self.rollback.reset();
        self.base.state = UncacheState::default();
        self.base.cycle = 0;
    }
}

impl UncacheBuffer {
    pub fn new(config: Arc<UncacheConfig>, logger: &Arc<Logger>) -> Result<Self> {
        config.validate()?;
        let num_slots = config.num_slots;
        let mut buffer = UncacheBuffer {
            base: ModuleBase::default(),
            slots: (0..num_slots).map(TransactionSlot::new).collect(),
            free_list: FreeList::new(num_slots, config.free_width),
            admission: AdmissionFilter::new(config.num_lanes),
            arbiter: BackendArbiter::new(num_slots),
            router: ResponseRouter::new(num_slots),
            fanout: WritebackFanout::new(num_slots, config.num_wb_ports),
            rollback: RollbackSelector::new(),
            logger: logger.clone(),
        };
        info!(
            buffer.logger,
            "uncache buffer: {} slots, {} lanes, {} writeback ports",
            num_slots,
            config.num_lanes,
            config.num_wb_ports
        );
        buffer.init_conf(config);
        Ok(buffer)
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, id: SlotId) -> &TransactionSlot {
        &self.slots[id]
    }

    pub fn slot_state(&self, id: SlotId) -> SlotState {
        self.slots[id].state()
    }

    pub fn occupancy(&self) -> usize {
        self.free_list.occupancy()
    }

    pub fn free_slots(&self) -> usize {
        self.free_list.free_count()
    }

    pub fn is_full(&self) -> bool {
        self.free_list.is_exhausted()
    }

    /// Nothing tracked, nothing in the admission pipeline, no rollback waiting.
    pub fn is_quiescent(&self) -> bool {
        self.free_list.occupancy() == 0
            && self.admission.is_idle()
            && self.rollback.staged().is_none()
    }

    pub fn tick(&mut self, inputs: &UncacheInputs) -> UncacheOutputs {
        let num_slots = self.slots.len();
        let flush = inputs.flush.as_ref();
        let head = self.state().head_token;
        let mut out = UncacheOutputs::new(self.conf());

        // every decision below reads the start-of-cycle state
        let flush_hit: Vec<bool> = self.slots.iter().map(|slot| slot.flush_hit(flush)).collect();

        let wants_ordered: Vec<bool> = self
            .slots
            .iter()
            .zip(&flush_hit)
            .map(|(slot, &hit)| !hit && slot.wants_ordered(head))
            .collect();
        let wants_unordered: Vec<bool> = self
            .slots
            .iter()
            .zip(&flush_hit)
            .map(|(slot, &hit)| !hit && slot.wants_unordered())
            .collect();
        let grant = self.arbiter.select(&wants_ordered, &wants_unordered);
        let fired = grant.filter(|_| inputs.backend_req_ready);
        if let Some(grant) = fired {
            out.backend_req = self.slots[grant.slot].backend_request();
            self.arbiter.on_fire(grant);
            debug!(self.logger, "[uncache] slot {} issued {:?}", grant.slot, out.backend_req);
        } else if let Some(grant) = grant {
            debug!(self.logger, "[uncache] slot {} stalled on busy channel", grant.slot);
        }

        let ready_for = |class: OrderClass| -> Vec<bool> {
            self.slots
                .iter()
                .zip(&flush_hit)
                .map(|(slot, &hit)| !hit && slot.writeback_ready() && slot.class() == Some(class))
                .collect()
        };
        let selection = self
            .fanout
            .select(&ready_for(OrderClass::Ordered), &ready_for(OrderClass::Unordered));
        let mut wb_fired = vec![false; num_slots];
        if let Some(slot) = selection.ordered.filter(|_| inputs.ordered_ready) {
            out.ordered_wb = self.slots[slot].ordered_writeback();
            wb_fired[slot] = true;
        }
        for (port, choice) in selection.unordered.iter().enumerate() {
            let port_ready = inputs.unordered_ready.get(port).copied().unwrap_or(false);
            if let Some(slot) = choice.filter(|_| port_ready) {
                out.unordered_wb[port] = self.slots[slot].writeback();
                wb_fired[slot] = true;
            }
        }
        // the oldest of the faults completing this cycle
        out.fault = (0..num_slots)
            .filter(|&slot| wb_fired[slot])
            .filter_map(|slot| {
                self.slots[slot]
                    .writeback()
                    .filter(Writeback::has_fault)
                    .map(|wb| FaultReport {
                        slot,
                        age: wb.age,
                        lq_idx: wb.lq_idx,
                        addr: wb.addr,
                        exceptions: wb.exceptions,
                    })
            })
            .min_by_key(|report| report.age);

        let routed = self.router.route(inputs.backend_resp.as_ref());

        let mut captures: Vec<Option<Request>> = vec![None; num_slots];
        let mut candidates: Vec<Option<RollbackCandidate>> = vec![None; self.admission.num_lanes()];
        let mut allocated = 0;
        for (lane, stage) in self.admission.evaluate(flush).into_iter().enumerate() {
            out.enqueue[lane] = match stage {
                LaneStage::Empty => None,
                LaneStage::Filtered(reason) => Some(EnqueueOutcome::Filtered(reason)),
                LaneStage::Enqueue { request, restart, prefix } => {
                    match self.free_list.allocate_slot(prefix) {
                        Some(slot) => {
                            if request.class.is_ordered() {
                                out.ordered_ack[lane] = Some(request.age);
                            }
                            debug!(
                                self.logger,
                                "[uncache] lane {} {} -> slot {} addr {:#x}",
                                lane,
                                request.age,
                                slot,
                                request.addr
                            );
                            captures[slot] = Some(request);
                            allocated += 1;
                            Some(EnqueueOutcome::Allocated(slot))
                        }
                        None => {
                            candidates[lane] = Some(RollbackCandidate {
                                lane,
                                age: request.age,
                                restart,
                            });
                            Some(EnqueueOutcome::Rejected)
                        }
                    }
                }
            };
        }
        self.free_list.do_allocate(allocated);

        for (id, slot) in self.slots.iter_mut().enumerate() {
            let release = slot.step(SlotInputs {
                capture: captures[id].take(),
                flush_hit: flush_hit[id],
                request_fired: fired.is_some_and(|grant| grant.slot == id),
                response: routed[id],
                writeback_fired: wb_fired[id],
            });
            if release {
                self.free_list.free(id);
            }
        }

        out.rollback = self.rollback.tick(&candidates, flush);
        if let Some(rollback) = &out.rollback {
            info!(
                self.logger,
                "[uncache] rollback lane {} {} restart pc {:#x}",
                rollback.lane,
                rollback.age,
                rollback.restart.pc
            );
        }

        for id in self.free_list.commit() {
            self.slots[id].release();
        }
        self.admission.advance(&inputs.lanes, flush);
        self.state_mut().head_token = inputs.head;
        self.base().cycle += 1;
        out
    }
}
