//! Anti-entropy for out-of-order delivery and lagging replicas (spec §4.7):
//! `RequestBlock`/`Respond` are view-agnostic so they work across a view
//! change too.

use log::trace;

use crate::error::Result;
use crate::message::{Body, Message};

use super::Engine;

impl Engine {
    pub(super) fn handle_request_block(&mut self, message: Message) -> Result<()> {
        let hash = match message.body {
            Body::RequestBlock(h) => h,
            _ => unreachable!("dispatch routes by code"),
        };
        let block = self
            .queue
            .get(&hash)
            .map(|entry| entry.block.clone())
            .or_else(|| self.committed.as_ref().filter(|b| b.hash() == hash).cloned())
            .or_else(|| self.reader.block_by_hash(&hash));
        match block {
            Some(block) => {
                let response = self.sign_message(Body::Respond(block));
                self.backend.send(response, message.sender);
            }
            None => trace!("no block for request {:?}", hash),
        }
        Ok(())
    }

    pub(super) fn handle_respond(&mut self, message: Message) -> Result<()> {
        let block = match message.body {
            Body::Respond(ref b) => b.clone(),
            _ => unreachable!("dispatch routes by code"),
        };
        self.queue.clear_requested(&block.hash());
        if self.status != e2c_types::Status::SteadyState {
            return Ok(());
        }
        if !self.has_accepted(&block.parent_hash()) {
            self.queue.stash_unhandled(block.clone());
            self.request_missing_block(block.parent_hash());
            return Ok(());
        }
        self.accept_block(block)
    }
}
