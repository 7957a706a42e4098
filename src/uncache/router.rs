use super::request::BackendResponse;
use super::types::SlotId;

/// One-to-one dispatch of the tagged response channel: the response is visible to the slot
/// whose index equals the tag and to nobody else.
#[derive(Debug)]
pub struct ResponseRouter {
    num_slots: usize,
}

impl ResponseRouter {
    pub fn new(num_slots: usize) -> Self {
        Self { num_slots }
    }

    /// The channel is never back-pressured by this buffer.
    pub fn ready(&self) -> bool {
        true
    }

    pub fn route<'a>(&self, response: Option<&'a BackendResponse>) -> Vec<Option<&'a BackendResponse>> {
        let mut routed = vec![None; self.num_slots];
        if let Some(resp) = response {
            debug_assert!(resp.tag < self.num_slots, "response tag {} out of range", resp.tag);
            if let Some(port) = routed.get_mut(resp.tag) {
                *port = Some(resp);
            }
        }
        routed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_reaches_only_its_slot() {
        let router = ResponseRouter::new(4);
        let resp = BackendResponse { tag: 2, data: 0xab, error: false };
        let routed = router.route(Some(&resp));
        assert_eq!(4, routed.len());
        for (slot, port) in routed.iter().enumerate() {
            assert_eq!(slot == 2, port.is_some());
        }
        assert!(router.route(None).iter().all(Option::is_none));
        assert!(router.ready());
    }
}
