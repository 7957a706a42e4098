/*
Time-queue for the harness side of the model.

A TimedServer stands in for a shared resource that sits outside the uncache buffer (the memory
responder behind the single external channel).  It enforces a simple service law:
    - at most one acceptance every `issue_interval` cycles
    - a fixed `base_latency` plus a per-request extra latency before the result is available
    - a bounded number of outstanding requests

When the server cannot accept work it hands the request back inside a Backpressure so the caller
can retry on a later cycle.  Results are released in ready order, which is not necessarily the
order requests were accepted in.
*/

use serde::Deserialize;

pub type Cycle = u64;

// Result of queueing a request with a timed server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    issued_at: Cycle,
    ready_at: Cycle,
}

impl Ticket {
    fn new(issued_at: Cycle, ready_at: Cycle) -> Self {
        Self { issued_at, ready_at }
    }

    // Cycle at which the request entered the server.
    pub fn issued_at(&self) -> Cycle {
        self.issued_at
    }

    // Cycle at which the payload becomes available to downstream consumers.
    pub fn ready_at(&self) -> Cycle {
        self.ready_at
    }

    pub fn is_ready(&self, now: Cycle) -> bool {
        now >= self.ready_at
    }
}

#[derive(Debug)]
pub struct ServiceRequest<T> {
    pub payload: T,
    pub extra_latency: Cycle,
}

impl<T> ServiceRequest<T> {
    pub fn new(payload: T) -> Self {
        Self { payload, extra_latency: 0 }
    }

    pub fn with_extra_latency(payload: T, extra_latency: Cycle) -> Self {
        Self { payload, extra_latency }
    }
}

#[derive(Debug)]
pub struct ServiceResult<T> {
    pub payload: T,
    pub ticket: Ticket,
}

// Reasons why the server rejected a request
#[derive(Debug)]
pub enum Backpressure<T> {
    // Too many requests are outstanding
    QueueFull { request: ServiceRequest<T>, capacity: usize },
    // The accept port was used too recently
    Busy { request: ServiceRequest<T>, available_at: Cycle },
}

impl<T> Backpressure<T> {
    // Recover the underlying request so it can be retried later.
    pub fn into_request(self) -> ServiceRequest<T> {
        match self {
            Backpressure::QueueFull { request, .. } => request,
            Backpressure::Busy { request, .. } => request,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // Fixed latency added to every request
    pub base_latency: Cycle,
    // Minimum spacing between two accepted requests
    pub issue_interval: Cycle,
    // Maximum number of outstanding requests the server will accept
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_latency: 0,
            issue_interval: 1,
            queue_capacity: 1,
        }
    }
}

#[derive(Debug)]
struct Inflight<T> {
    payload: T,
    ticket: Ticket,
}

#[derive(Debug)]
pub struct TimedServer<T> {
    config: ServerConfig,
    inflight: Vec<Inflight<T>>,
    next_accept_at: Cycle,
}

impl<T> TimedServer<T> {
    pub fn new(config: ServerConfig) -> Self {
        assert!(config.issue_interval > 0, "issue_interval must be > 0");
        assert!(config.queue_capacity > 0, "queue_capacity must be > 0");
        Self {
            config,
            inflight: Vec::with_capacity(config.queue_capacity),
            next_accept_at: 0,
        }
    }

    pub fn can_accept(&self, now: Cycle) -> bool {
        self.inflight.len() < self.config.queue_capacity && now >= self.next_accept_at
    }

    pub fn try_enqueue(
        &mut self,
        now: Cycle,
        request: ServiceRequest<T>,
    ) -> Result<Ticket, Backpressure<T>> {
        if self.inflight.len() >= self.config.queue_capacity {
            return Err(Backpressure::QueueFull {
                request,
                capacity: self.config.queue_capacity,
            });
        }
        if now < self.next_accept_at {
            return Err(Backpressure::Busy {
                request,
                available_at: self.next_accept_at,
            });
        }

        let ready_at = now
            .saturating_add(self.config.base_latency)
            .saturating_add(request.extra_latency);
        let ticket = Ticket::new(now, ready_at);
        self.next_accept_at = now.saturating_add(self.config.issue_interval);
        self.inflight.push(Inflight {
            payload: request.payload,
            ticket,
        });
        Ok(ticket)
    }

    // Earliest-ready entry; ties go to the one accepted first.
    fn ready_index(&self, now: Cycle) -> Option<usize> {
        self.inflight
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.ticket.is_ready(now))
            .min_by_key(|(idx, entry)| (entry.ticket.ready_at(), *idx))
            .map(|(idx, _)| idx)
    }

    pub fn peek_ready(&self, now: Cycle) -> Option<&T> {
        self.ready_index(now).map(|idx| &self.inflight[idx].payload)
    }

    pub fn pop_ready(&mut self, now: Cycle) -> Option<ServiceResult<T>> {
        let idx = self.ready_index(now)?;
        let entry = self.inflight.remove(idx);
        Some(ServiceResult {
            payload: entry.payload,
            ticket: entry.ticket,
        })
    }

    pub fn outstanding(&self) -> usize {
        self.inflight.len()
    }

    pub fn clear(&mut self) {
        self.inflight.clear();
        self.next_accept_at = 0;
    }
}
