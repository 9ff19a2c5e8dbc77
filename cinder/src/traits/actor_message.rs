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

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use static_assertions::assert_impl_all;

/// Marker trait for every value that can travel between actors.
///
/// Implemented automatically for any `Send + Sync + Debug + 'static` type, so
/// `#[cinder_message]` structs, `String`s and primitives all qualify.
pub trait ActorMessage: Any + Send + Sync + fmt::Debug {
    /// Returns `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// The concrete type name, used in logs.
    fn type_name(&self) -> &'static str;
}

impl<T> ActorMessage for T
where
    T: Any + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A shared, type-erased message payload.
///
/// Cloning is cheap: every clone points at the same value, which is how one
/// message reaches several recipients (forwards, watch notices) without copying.
#[derive(Clone)]
pub struct Message(Arc<dyn ActorMessage>);

impl Message {
    /// Wraps `message`. Wrapping a `Message` again returns it unchanged.
    pub fn new<M: ActorMessage>(message: M) -> Self {
        if let Some(existing) = (&message as &dyn Any).downcast_ref::<Self>() {
            return existing.clone();
        }
        Self(Arc::new(message))
    }

    fn inner(&self) -> &dyn ActorMessage {
        &*self.0
    }

    /// Borrows the payload as `T` when that is its concrete type.
    pub fn downcast_ref<T: ActorMessage>(&self) -> Option<&T> {
        self.inner().as_any().downcast_ref::<T>()
    }

    /// Whether the payload's concrete type is `T`.
    pub fn is<T: ActorMessage>(&self) -> bool {
        self.inner().as_any().is::<T>()
    }

    /// The payload's concrete type name.
    pub fn type_name(&self) -> &'static str {
        self.inner().type_name()
    }

    pub(crate) fn payload_type_id(&self) -> TypeId {
        self.inner().as_any().type_id()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner(), f)
    }
}

assert_impl_all!(Message: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Ping(u32);

    #[test]
    fn downcasts_to_the_wrapped_type() {
        let message = Message::new(Ping(7));
        assert!(message.is::<Ping>());
        assert_eq!(message.downcast_ref::<Ping>(), Some(&Ping(7)));
        assert!(message.downcast_ref::<String>().is_none());
        assert!(message.type_name().ends_with("Ping"));
    }

    #[test]
    fn rewrapping_keeps_the_original_payload() {
        let message = Message::new("pong".to_string());
        let again = Message::new(message.clone());
        assert_eq!(again.downcast_ref::<String>().map(String::as_str), Some("pong"));
        assert!(!again.is::<Message>());
    }
}
