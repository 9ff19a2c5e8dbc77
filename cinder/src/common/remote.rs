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

use std::sync::Arc;

use dashmap::DashMap;
use derive_new::new;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::message::{Address, Envelope};
use crate::traits::{Process, Transport};

/// One ordered outbound stream per destination host, each drained by its own
/// task that hands envelopes to the [`Transport`] one at a time.
pub(crate) struct RemoteStreams {
    transport: Arc<dyn Transport>,
    handle: Handle,
    streams: DashMap<String, mpsc::UnboundedSender<Envelope>>,
}

impl RemoteStreams {
    pub(crate) fn new(transport: Arc<dyn Transport>, handle: Handle) -> Self {
        Self {
            transport,
            handle,
            streams: DashMap::new(),
        }
    }

    pub(crate) fn send(&self, envelope: Envelope) {
        let host = envelope.receiver().host().to_string();
        let sender = self
            .streams
            .entry(host.clone())
            .or_insert_with(|| self.open(host.clone()))
            .clone();
        if let Err(mpsc::error::SendError(envelope)) = sender.send(envelope) {
            // The drain task is gone; start a fresh stream and retry once.
            self.streams.remove(&host);
            let sender = self.open(host.clone());
            if sender.send(envelope).is_err() {
                warn!(host = %host, "remote stream unavailable, envelope dropped");
                return;
            }
            self.streams.insert(host, sender);
        }
    }

    fn open(&self, host: String) -> mpsc::UnboundedSender<Envelope> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Envelope>();
        let transport = Arc::clone(&self.transport);
        self.handle.spawn(async move {
            trace!(host = %host, "remote stream opened");
            while let Some(envelope) = receiver.recv().await {
                let receiver_address = envelope.receiver().clone();
                if let Err(error) = transport.send(envelope).await {
                    warn!(host = %host, receiver = %receiver_address, error = %error, "remote send failed");
                }
            }
        });
        sender
    }
}

/// Stand-in for a process living on another host.
#[derive(new)]
pub(crate) struct RemoteProcess {
    address: Address,
    streams: Arc<RemoteStreams>,
}

impl Process for RemoteProcess {
    fn address(&self) -> &Address {
        &self.address
    }

    fn send(&self, envelope: Envelope) {
        self.streams.send(envelope);
    }

    fn is_terminated(&self) -> bool {
        false
    }
}
