/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::fmt;

use static_assertions::assert_impl_all;

use crate::message::Address;
use crate::traits::Message;

/// Which mailbox lane an envelope travels in.
///
/// The system lane carries runtime protocol traffic (launch, kill, watch,
/// heartbeats, escalations) and is always drained before the user lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageClass {
    /// Application traffic, held back while the mailbox is suspended.
    User,
    /// Runtime protocol traffic, never held back.
    System,
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::System => f.write_str("system"),
        }
    }
}

/// A message in transit, immutable once built.
///
/// `agent`, when set, is where replies go instead of `sender`. The ask pattern
/// sets it to the address of the waiting [`AskFuture`](crate::common::AskFuture),
/// so the asked actor answers the future while still seeing the real sender.
#[derive(Clone)]
pub struct Envelope {
    agent: Option<Address>,
    sender: Address,
    receiver: Address,
    message: Message,
    class: MessageClass,
}

impl Envelope {
    /// Builds an envelope whose replies go back to `sender`.
    pub fn new(sender: Address, receiver: Address, class: MessageClass, message: Message) -> Self {
        Self {
            agent: None,
            sender,
            receiver,
            message,
            class,
        }
    }

    /// Builds an envelope whose replies go to `agent`.
    pub fn with_agent(
        agent: Address,
        sender: Address,
        receiver: Address,
        class: MessageClass,
        message: Message,
    ) -> Self {
        Self {
            agent: Some(agent),
            sender,
            receiver,
            message,
            class,
        }
    }

    /// The reply indirection, if any.
    pub fn agent(&self) -> Option<&Address> {
        self.agent.as_ref()
    }

    /// The address that sent this message.
    pub fn sender(&self) -> &Address {
        &self.sender
    }

    /// The address this message is for.
    pub fn receiver(&self) -> &Address {
        &self.receiver
    }

    /// The payload.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The mailbox lane.
    pub fn class(&self) -> MessageClass {
        self.class
    }

    /// Where a reply to this envelope should be delivered.
    pub fn reply_to(&self) -> &Address {
        self.agent.as_ref().unwrap_or(&self.sender)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("class", &self.class)
            .field("sender", &format_args!("{}", self.sender))
            .field("receiver", &format_args!("{}", self.receiver))
            .field("agent", &self.agent.as_ref().map(ToString::to_string))
            .field("message", &self.message.type_name())
            .finish()
    }
}

assert_impl_all!(Envelope: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_prefer_the_agent() {
        let root = Address::root("localhost");
        let caller = root.sub("caller");
        let callee = root.sub("callee");
        let future = caller.sub("future-1");

        let told = Envelope::new(caller.clone(), callee.clone(), MessageClass::User, Message::new(1_u8));
        assert_eq!(told.reply_to(), &caller);
        assert!(told.agent().is_none());

        let asked = Envelope::with_agent(future.clone(), caller.clone(), callee, MessageClass::System, Message::new(2_u8));
        assert_eq!(asked.reply_to(), &future);
        assert_eq!(asked.sender(), &caller);
        assert_eq!(asked.class(), MessageClass::System);
    }
}
