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

use cinder::prelude::*;

/// Recorded by [`Recorder`](super::Recorder) as its number.
#[cinder_message]
pub struct Record(pub u32);

/// Makes the recorder record `sleeping`, sleep for the given milliseconds, then record `slept`.
#[cinder_message]
pub struct Sleep(pub u64);

/// Makes the recorder panic.
#[cinder_message]
pub struct Boom;

/// Makes the recorder return an error.
#[cinder_message]
pub struct Fail;

/// Answered with [`Pong`].
#[cinder_message]
pub struct Ping;

#[cinder_message]
pub struct Pong;

/// Answered with [`Total`] by counting actors.
#[cinder_message]
pub struct GetTotal;

#[cinder_message]
pub struct Total(pub u64);

#[cinder_message]
pub struct Add(pub u64);

/// Never answered by anyone.
#[cinder_message]
pub struct Silence;

/// Answered with an error reply.
#[cinder_message]
pub struct Refuse;
