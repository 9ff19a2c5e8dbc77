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
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;

use crate::traits::Process;

/// The path of the root guardian on every host.
pub const ROOT_PATH: &str = "/";

/// Location-transparent identity of a process: a `host` naming the runtime
/// instance and a slash separated `path` naming the process within it.
///
/// Equality and hashing only consider `host` and `path`. Each address also
/// carries a non-authoritative cache of the local process it last resolved
/// to; the registry refreshes it on lookup and ignores it once the cached
/// process has terminated.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "AddressParts", into = "AddressParts")]
pub struct Address {
    inner: Arc<AddressInner>,
}

struct AddressInner {
    host: String,
    path: String,
    cache: RwLock<Option<Weak<dyn Process>>>,
}

#[derive(Serialize, Deserialize)]
struct AddressParts {
    host: String,
    path: String,
}

impl Address {
    /// Creates an address from its host and path. An empty path is treated as the root.
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        let mut path = path.into();
        if path.is_empty() {
            path = ROOT_PATH.to_string();
        } else if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            inner: Arc::new(AddressInner {
                host: host.into(),
                path,
                cache: RwLock::new(None),
            }),
        }
    }

    /// The root guardian address on `host`.
    pub fn root(host: impl Into<String>) -> Self {
        Self::new(host, ROOT_PATH)
    }

    /// Derives a child address by appending `segment` to this path.
    pub fn sub(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref().trim_matches('/');
        let path = if self.is_root() {
            format!("/{segment}")
        } else {
            format!("{}/{segment}", self.inner.path)
        };
        Self::new(self.inner.host.clone(), path)
    }

    /// The runtime instance this address lives on.
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// The slash separated path within the host.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// The last path segment, which is how a parent keys its children.
    pub fn name(&self) -> &str {
        self.inner
            .path
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(ROOT_PATH)
    }

    /// Whether this is a root guardian address.
    pub fn is_root(&self) -> bool {
        self.inner.path == ROOT_PATH
    }

    /// Whether `other` sits strictly below this address on the same host.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        if self.host() != other.host() || self == other {
            return false;
        }
        self.is_root() || other.path().starts_with(&format!("{}/", self.path()))
    }

    /// Whether both handles come from the same original address, not merely an equal one.
    pub(crate) fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn cached_process(&self) -> Option<Arc<dyn Process>> {
        let cached = self.inner.cache.read().as_ref().and_then(Weak::upgrade);
        match cached {
            Some(process) if !process.is_terminated() => Some(process),
            Some(_) => {
                self.clear_cache();
                None
            }
            None => None,
        }
    }

    pub(crate) fn cache_process(&self, process: &Arc<dyn Process>) {
        *self.inner.cache.write() = Some(Arc::downgrade(process));
    }

    pub(crate) fn clear_cache(&self) {
        *self.inner.cache.write() = None;
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.host == other.inner.host && self.inner.path == other.inner.path)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.host.hash(state);
        self.inner.path.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cinder://{}{}", self.inner.host, self.inner.path)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl From<AddressParts> for Address {
    fn from(parts: AddressParts) -> Self {
        Self::new(parts.host, parts.path)
    }
}

impl From<Address> for AddressParts {
    fn from(address: Address) -> Self {
        Self {
            host: address.inner.host.clone(),
            path: address.inner.path.clone(),
        }
    }
}

assert_impl_all!(Address: Send, Sync);
