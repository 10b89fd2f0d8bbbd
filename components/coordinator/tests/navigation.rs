/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

mod common;

use std::rc::Rc;

use base::id::{BrowsingContextId, ProcessId};
use browser_traits::{
    ExtensionPolicyDecision, NavigationRequest, SiteInstance, WindowOpenDisposition,
};
use common::{harness, harness_with_policy, url, DenyAllWindows, MockExtensionPolicy,
             MockSiteInstance};
use coordinator::NavigationOutcome;

const CONTEXT: BrowsingContextId = BrowsingContextId(1);

// Cross-site navigation with no suppression and no extension policy: a new
// instance for the target URL, and a pending-process entry mapping the new
// process back to the process hosting the old content.
#[test]
fn cross_site_navigation_creates_instance_and_pending_entry() {
    let mut harness = harness();
    harness.processes.set_live(ProcessId(1));
    let current: Rc<dyn SiteInstance> = MockSiteInstance::new("https://a.example/", Some(ProcessId(1)));

    let outcome =
        harness
            .coordinator
            .decide_navigation(CONTEXT, &current, &url("https://b.example/"));

    let NavigationOutcome::NewInstanceForUrl(instance) = outcome else {
        unreachable!("expected a new instance");
    };
    assert_eq!(instance.site_url(), url("https://b.example/"));
    let pending = instance.process().expect("factory assigns a process");
    assert_eq!(harness.coordinator.resolve_process(pending), ProcessId(1));

    // Both ends of the association are watched for termination.
    let watched = harness.processes.watched.borrow().clone();
    assert!(watched.contains(&ProcessId(1)));
    assert!(watched.contains(&pending));
}

// javascript: navigations only run script in the existing document and must
// never trigger a process change.
#[test]
fn javascript_scheme_reuses_the_current_instance() {
    let mut harness = harness();
    let current: Rc<dyn SiteInstance> = MockSiteInstance::new("https://a.example/", Some(ProcessId(1)));

    let outcome =
        harness
            .coordinator
            .decide_navigation(CONTEXT, &current, &url("javascript:void(0)"));

    assert!(matches!(outcome, NavigationOutcome::ReuseCurrentInstance));
    assert_eq!(harness.coordinator.pending_process_count(), 0);
    assert!(harness.factory.created.borrow().is_empty());
}

// The suppression flag holds for exactly one navigation.
#[test]
fn suppression_flag_is_consumed_by_one_navigation() {
    let mut harness = harness();
    harness.processes.set_live(ProcessId(1));
    let current: Rc<dyn SiteInstance> = MockSiteInstance::new("https://a.example/", Some(ProcessId(1)));

    harness.coordinator.suppress_process_restart_for_once();

    let first = harness
        .coordinator
        .decide_navigation(CONTEXT, &current, &url("https://b.example/"));
    assert!(matches!(first, NavigationOutcome::ReuseCurrentInstance));

    let second = harness
        .coordinator
        .decide_navigation(CONTEXT, &current, &url("https://b.example/"));
    assert!(matches!(second, NavigationOutcome::NewInstanceForUrl(_)));
}

// The flag is cleared on entry even when the extension policy takes the
// decision first.
#[test]
fn suppression_wins_over_the_extension_policy_and_is_still_consumed() {
    let policy = Rc::new(MockExtensionPolicy {
        navigation: Some(ExtensionPolicyDecision::ForceNewInstance),
        ..MockExtensionPolicy::default()
    });
    let mut harness = harness_with_policy(Some(policy));
    let current: Rc<dyn SiteInstance> = MockSiteInstance::new("https://a.example/", Some(ProcessId(1)));

    harness.coordinator.suppress_process_restart_for_once();
    let first = harness
        .coordinator
        .decide_navigation(CONTEXT, &current, &url("https://b.example/"));
    assert!(matches!(first, NavigationOutcome::ReuseCurrentInstance));

    let second = harness
        .coordinator
        .decide_navigation(CONTEXT, &current, &url("https://b.example/"));
    assert!(matches!(
        second,
        NavigationOutcome::Deferred(ExtensionPolicyDecision::ForceNewInstance)
    ));
}

#[test]
fn extension_policy_decisions_are_deferred_to_the_embedder() {
    let policy = Rc::new(MockExtensionPolicy {
        navigation: Some(ExtensionPolicyDecision::Veto),
        ..MockExtensionPolicy::default()
    });
    let mut harness = harness_with_policy(Some(policy));
    let current: Rc<dyn SiteInstance> = MockSiteInstance::new("https://a.example/", Some(ProcessId(1)));

    let outcome = harness
        .coordinator
        .decide_navigation(CONTEXT, &current, &url("https://b.example/"));
    assert!(matches!(
        outcome,
        NavigationOutcome::Deferred(ExtensionPolicyDecision::Veto)
    ));
    // The default policy never ran, so no instance and no pending entry.
    assert!(harness.factory.created.borrow().is_empty());
    assert_eq!(harness.coordinator.pending_process_count(), 0);
}

#[test]
fn a_declining_extension_policy_falls_through_to_the_default() {
    let policy = Rc::new(MockExtensionPolicy::default());
    let mut harness = harness_with_policy(Some(policy));
    harness.processes.set_live(ProcessId(1));
    let current: Rc<dyn SiteInstance> = MockSiteInstance::new("https://a.example/", Some(ProcessId(1)));

    let outcome = harness
        .coordinator
        .decide_navigation(CONTEXT, &current, &url("https://b.example/"));
    assert!(matches!(outcome, NavigationOutcome::NewInstanceForUrl(_)));
}

// The created instance is retained by a posted no-op continuation until the
// current task completes.
#[test]
fn the_new_instance_is_retained_until_the_decision_is_consumed() {
    let mut harness = harness();
    harness.processes.set_live(ProcessId(1));
    let current: Rc<dyn SiteInstance> = MockSiteInstance::new("https://a.example/", Some(ProcessId(1)));

    let outcome =
        harness
            .coordinator
            .decide_navigation(CONTEXT, &current, &url("https://b.example/"));
    let NavigationOutcome::NewInstanceForUrl(instance) = outcome else {
        unreachable!("expected a new instance");
    };

    // The retention task still holds a second reference.
    assert!(Rc::strong_count(&instance) >= 2);
    assert_eq!(harness.message_loop.run_pending_tasks(), 1);
}

#[test]
fn same_process_instances_create_no_pending_entry() {
    let mut harness = harness();
    // The factory would assign process 100; pretend the current instance
    // already lives there.
    let current: Rc<dyn SiteInstance> =
        MockSiteInstance::new("https://a.example/", Some(ProcessId(100)));

    let outcome =
        harness
            .coordinator
            .decide_navigation(CONTEXT, &current, &url("https://b.example/"));
    assert!(matches!(outcome, NavigationOutcome::NewInstanceForUrl(_)));
    assert_eq!(harness.coordinator.pending_process_count(), 0);
}

#[test]
fn open_url_and_process_per_site_defaults_and_overrides() {
    let harness_without = harness();
    let instance = MockSiteInstance::new("https://a.example/", Some(ProcessId(1)));
    assert!(harness_without
        .coordinator
        .should_allow_open_url(&*instance, &url("https://b.example/")));
    assert!(!harness_without
        .coordinator
        .should_use_process_per_site(CONTEXT, &url("https://b.example/")));
    assert!(!harness_without.coordinator.should_swap_browsing_instances(
        &*instance,
        &url("https://a.example/"),
        &url("https://b.example/"),
    ));

    let policy = Rc::new(MockExtensionPolicy {
        allow_open_url: Some(false),
        process_per_site: Some(true),
        swap_browsing_instances: Some(true),
        ..MockExtensionPolicy::default()
    });
    let harness_with = harness_with_policy(Some(policy));
    assert!(!harness_with
        .coordinator
        .should_allow_open_url(&*instance, &url("https://b.example/")));
    assert!(harness_with
        .coordinator
        .should_use_process_per_site(CONTEXT, &url("https://b.example/")));
    assert!(harness_with.coordinator.should_swap_browsing_instances(
        &*instance,
        &url("https://a.example/"),
        &url("https://b.example/"),
    ));
}

#[test]
fn window_creation_is_allowed_unless_a_delegate_objects() {
    let mut harness = harness();
    let request = NavigationRequest {
        opener_url: url("https://a.example/"),
        source_origin: url("https://a.example/"),
        target_url: url("https://b.example/popup"),
        disposition: WindowOpenDisposition::NewPopup,
        user_gesture: true,
    };
    assert!(harness.coordinator.can_create_window(&request));

    harness
        .coordinator
        .set_window_open_delegate(Rc::new(DenyAllWindows));
    assert!(!harness.coordinator.can_create_window(&request));
}
