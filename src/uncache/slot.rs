use serde::Serialize;

use super::request::{BackendRequest, BackendResponse, MemCommand, OrderedWriteback, Request, Writeback};
use super::types::{need_flush, AgeKey, ExceptionSet, Flush, OrderClass, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SlotState {
    /// Empty, or holding a finished/cancelled request until the free list takes the slot back.
    #[default]
    Idle,
    /// Waiting to win the back-end channel.
    Requesting,
    /// Handed off; waiting for the response tagged with this slot.
    AwaitingResponse,
    /// Response captured; waiting for a writeback port.
    AwaitingWriteback,
}

/// Everything a slot sees in one cycle.  Built by the buffer from the start-of-cycle snapshot.
#[derive(Debug, Default)]
pub struct SlotInputs<'a> {
    pub capture: Option<Request>,
    pub flush_hit: bool,
    pub request_fired: bool,
    pub response: Option<&'a BackendResponse>,
    pub writeback_fired: bool,
}

#[derive(Debug)]
pub struct TransactionSlot {
    id: SlotId,
    occupied: bool,
    state: SlotState,
    request: Option<Request>,
    response_data: u64,
    response_error: bool,
    cancel_pending: bool,
}

impl TransactionSlot {
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            occupied: false,
            state: SlotState::Idle,
            request: None,
            response_data: 0,
            response_error: false,
            cancel_pending: false,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn cancel_pending(&self) -> bool {
        self.cancel_pending
    }

    /// Live request, i.e. one that has not yet gone back to idle.
    fn active(&self) -> Option<&Request> {
        match self.state {
            SlotState::Idle => None,
            _ => self.request.as_ref(),
        }
    }

    pub fn age(&self) -> Option<AgeKey> {
        self.active().map(|req| req.age)
    }

    pub fn class(&self) -> Option<OrderClass> {
        self.active().map(|req| req.class)
    }

    pub fn flush_hit(&self, flush: Option<&Flush>) -> bool {
        self.active().is_some_and(|req| need_flush(flush, req.age))
    }

    /// Requesting and allowed to go to the channel this cycle.  Ordered requests need the
    /// head-of-program-order token.
    pub fn is_eligible(&self, head: Option<AgeKey>) -> bool {
        if self.state != SlotState::Requesting || self.cancel_pending {
            return false;
        }
        match self.request.as_ref() {
            Some(req) if req.class.is_ordered() => head == Some(req.age),
            Some(_) => true,
            None => false,
        }
    }

    pub fn wants_ordered(&self, head: Option<AgeKey>) -> bool {
        self.class() == Some(OrderClass::Ordered) && self.is_eligible(head)
    }

    pub fn wants_unordered(&self) -> bool {
        self.class() == Some(OrderClass::Unordered) && self.is_eligible(None)
    }

    pub fn backend_request(&self) -> Option<BackendRequest> {
        if self.state != SlotState::Requesting {
            return None;
        }
        self.request.as_ref().map(|req| BackendRequest {
            addr: req.addr,
            mask: req.beat_mask(),
            cmd: MemCommand::Read,
            tag: self.id,
            atomic: req.atomic,
        })
    }

    pub fn writeback_ready(&self) -> bool {
        self.state == SlotState::AwaitingWriteback && !self.cancel_pending
    }

    pub fn writeback(&self) -> Option<Writeback> {
        if !self.writeback_ready() {
            return None;
        }
        let req = self.request.as_ref()?;
        let mut exceptions = req.exceptions;
        if self.response_error {
            exceptions.insert(ExceptionSet::LOAD_ACCESS_FAULT);
        }
        Some(Writeback {
            age: req.age,
            lq_idx: req.lq_idx,
            addr: req.addr,
            class: req.class,
            data: req.size.select(self.response_data, req.addr),
            exceptions,
        })
    }

    pub fn ordered_writeback(&self) -> Option<OrderedWriteback> {
        self.writeback().map(|writeback| OrderedWriteback {
            writeback,
            raw_data: self.response_data,
        })
    }

    /// Advance one cycle.  Returns true when the slot asks the free list to take it back.
    pub fn step(&mut self, inputs: SlotInputs<'_>) -> bool {
        if let Some(request) = inputs.capture {
            assert!(
                !self.occupied,
                "slot {} re-submitted while still holding {:?}",
                self.id,
                self.request.as_ref().map(|req| req.age)
            );
            self.occupied = true;
            self.state = SlotState::Requesting;
            self.request = Some(request);
            self.response_data = 0;
            self.response_error = false;
            self.cancel_pending = false;
            return false;
        }

        if self.state == SlotState::Idle {
            debug_assert!(inputs.response.is_none(), "response for idle slot {}", self.id);
            return false;
        }

        debug_assert!(
            !(inputs.flush_hit && inputs.request_fired),
            "slot {} issued while being flushed",
            self.id
        );
        if inputs.flush_hit {
            self.cancel_pending = true;
        }

        match self.state {
            SlotState::Idle => false,
            SlotState::Requesting => {
                if self.cancel_pending {
                    self.state = SlotState::Idle;
                    true
                } else {
                    if inputs.request_fired {
                        self.state = SlotState::AwaitingResponse;
                    }
                    false
                }
            }
            SlotState::AwaitingResponse => match inputs.response {
                Some(resp) => {
                    debug_assert_eq!(resp.tag, self.id);
                    self.response_data = resp.data;
                    self.response_error = resp.error;
                    if self.cancel_pending {
                        self.state = SlotState::Idle;
                        true
                    } else {
                        self.state = SlotState::AwaitingWriteback;
                        false
                    }
                }
                // a cancelled slot keeps waiting so the channel's tag has an owner
                None => false,
            },
            SlotState::AwaitingWriteback => {
                debug_assert!(inputs.response.is_none(), "second response for slot {}", self.id);
                if self.cancel_pending || inputs.writeback_fired {
                    self.state = SlotState::Idle;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Called once the free list has the index back.
    pub fn release(&mut self) {
        debug_assert_eq!(self.state, SlotState::Idle, "slot {} released while busy", self.id);
        self.occupied = false;
    }

    pub fn reset(&mut self) {
        *self = TransactionSlot::new(self.id);
    }
}
