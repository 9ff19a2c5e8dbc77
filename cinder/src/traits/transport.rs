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

use async_trait::async_trait;

use crate::message::Envelope;

/// Carries envelopes to other runtime instances.
///
/// The runtime hands every envelope for a given destination host to `send`
/// sequentially and in order, one call at a time, so an implementation that
/// completes each call before returning preserves per-destination FIFO.
/// Framing, batching, reconnects and host handshakes belong to the transport.
/// The receiving side feeds envelopes to
/// [`ActorSystem::receive_remote`](crate::common::ActorSystem::receive_remote).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one envelope to `envelope.receiver().host()`.
    async fn send(&self, envelope: Envelope) -> anyhow::Result<()>;
}

/// Wire encoding used by transports. Local delivery never serialises.
pub trait Codec: Send + Sync + 'static {
    /// Encodes an envelope into bytes.
    fn encode(&self, envelope: &Envelope) -> anyhow::Result<Vec<u8>>;

    /// Decodes bytes produced by [`Codec::encode`].
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<Envelope>;
}
