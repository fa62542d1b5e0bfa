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

use self_service_postgres_operator::utils::{
    finalizers_with_ours, finalizers_without_ours, has_finalizer, matches_instance_annotation,
    random_string, secure_random_string, shorten_string, FINALIZER, INSTANCE_ANNOTATION,
};

fn annotated(value: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(INSTANCE_ANNOTATION.to_string(), value.to_string())])
}

#[test]
fn instance_annotation_matching() {
    assert!(matches_instance_annotation(None, ""));
    assert!(matches_instance_annotation(Some(&BTreeMap::new()), ""));
    assert!(!matches_instance_annotation(None, "blue"));

    assert!(matches_instance_annotation(Some(&annotated("blue")), "blue"));
    assert!(matches_instance_annotation(Some(&annotated("Blue")), "bLUE"));
    assert!(!matches_instance_annotation(Some(&annotated("green")), "blue"));
    assert!(!matches_instance_annotation(Some(&annotated("green")), ""));
}

#[test]
fn random_strings_are_alphanumeric() {
    for s in [random_string(6), secure_random_string(15)] {
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()), "{}", s);
    }
    assert_eq!(random_string(6).len(), 6);
    assert_eq!(secure_random_string(15).len(), 15);
    assert_ne!(secure_random_string(15), secure_random_string(15));
}

#[test]
fn finalizer_helpers_keep_foreign_finalizers() {
    let meta = ObjectMeta {
        finalizers: Some(vec!["other/finalizer".to_string()]),
        ..Default::default()
    };
    assert!(!has_finalizer(&meta));

    let with = finalizers_with_ours(&meta);
    assert_eq!(with, vec!["other/finalizer".to_string(), FINALIZER.to_string()]);

    let meta = ObjectMeta {
        finalizers: Some(with),
        ..Default::default()
    };
    assert!(has_finalizer(&meta));
    assert_eq!(finalizers_with_ours(&meta).len(), 2);
    assert_eq!(finalizers_without_ours(&meta), vec!["other/finalizer".to_string()]);

    assert!(finalizers_without_ours(&ObjectMeta::default()).is_empty());
}

#[test]
fn shorten_string_works() {
    assert_eq!(shorten_string("short"), "short");
    assert_eq!(shorten_string("two\nlines"), "two lines");

    let long = "x".repeat(80);
    let short = shorten_string(&long);
    assert_eq!(short.chars().count(), 50);
    assert!(short.ends_with("..."));

    let exact = "y".repeat(50);
    assert_eq!(shorten_string(&exact), exact);
}
