/*
 * Copyright 2021 Daniel Bornkessel
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{thread_rng, Rng};

pub const INSTANCE_ANNOTATION: &str = "postgres.selfservice.innoq.io/instance";
pub const FINALIZER: &str = "postgres.selfservice.innoq.io/finalizer";

/// A resource is handled if its instance annotation equals the configured
/// instance (ignoring case) or if neither of them is set.
pub fn matches_instance_annotation(
    annotations: Option<&BTreeMap<String, String>>,
    instance: &str,
) -> bool {
    match annotations.and_then(|a| a.get(INSTANCE_ANNOTATION)) {
        Some(value) => value.to_lowercase() == instance.to_lowercase(),
        None => instance.is_empty(),
    }
}

pub fn random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Like [`random_string`] but drawn from the operating system's rng; used for passwords.
pub fn secure_random_string(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn has_finalizer(meta: &ObjectMeta) -> bool {
    meta.finalizers
        .as_ref()
        .map(|f| f.iter().any(|f| f == FINALIZER))
        .unwrap_or(false)
}

/// The resource's finalizers plus ours.
pub fn finalizers_with_ours(meta: &ObjectMeta) -> Vec<String> {
    let mut finalizers = meta.finalizers.clone().unwrap_or_default();
    if !finalizers.iter().any(|f| f == FINALIZER) {
        finalizers.push(FINALIZER.to_string());
    }
    finalizers
}

/// The resource's finalizers without ours.
pub fn finalizers_without_ours(meta: &ObjectMeta) -> Vec<String> {
    meta.finalizers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != FINALIZER)
        .collect()
}

/// One line, at most 50 characters; used for the status summary column.
pub fn shorten_string(s: &str) -> String {
    const MAX_LEN: usize = 50;
    let line = s.replace('\n', " ");
    if line.chars().count() <= MAX_LEN {
        return line;
    }
    let mut short: String = line.chars().take(MAX_LEN - 3).collect();
    short.push_str("...");
    short
}
