/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The per-navigation process assignment policy: given where a navigation is
//! coming from and where it is going, decide whether it executes in a fresh
//! site instance or stays where it is.

use std::mem;
use std::rc::Rc;

use base::id::BrowsingContextId;
use browser_traits::{
    ExtensionPolicyDecision, ExtensionPolicyOracle, NavigationRequest, SiteInstance,
    SiteInstanceFactory, WindowOpenDelegate, JAVASCRIPT_SCHEME,
};
use log::debug;
use url::Url;

use crate::message_loop::LocalTaskSender;

/// The outcome of one navigation decision. Computed fresh per navigation,
/// never persisted.
pub enum NavigationOutcome {
    /// Keep executing in the current site instance and process.
    ReuseCurrentInstance,
    /// Execute in this freshly created site instance, which may live in a
    /// different process.
    NewInstanceForUrl(Rc<dyn SiteInstance>),
    /// The extension-aware policy took the decision; the embedder interprets
    /// its verdict.
    Deferred(ExtensionPolicyDecision),
}

/// Decides where navigations execute. One per coordinator; owns the one-shot
/// suppression flag rather than leaving it a process-wide global.
pub struct ProcessAssignmentPolicy {
    /// When set, exactly the next navigation reuses the current instance.
    /// Consumed (cleared) on entry to every evaluation, whether or not the
    /// extension policy ends up deciding.
    suppress_process_restart_once: bool,

    /// The extension-aware policy, when the embedder has one. Checked for
    /// presence at run time; there is only one code path either way.
    extension_policy: Option<Rc<dyn ExtensionPolicyOracle>>,

    /// The embedder's window-open veto point, if any.
    window_open_delegate: Option<Rc<dyn WindowOpenDelegate>>,
}

impl ProcessAssignmentPolicy {
    pub fn new(extension_policy: Option<Rc<dyn ExtensionPolicyOracle>>) -> ProcessAssignmentPolicy {
        ProcessAssignmentPolicy {
            suppress_process_restart_once: false,
            extension_policy,
            window_open_delegate: None,
        }
    }

    pub fn set_window_open_delegate(&mut self, delegate: Rc<dyn WindowOpenDelegate>) {
        self.window_open_delegate = Some(delegate);
    }

    /// Prevent a process restart for exactly the next navigation. The flag
    /// never persists past one evaluation.
    pub fn suppress_process_restart_for_once(&mut self) {
        self.suppress_process_restart_once = true;
    }

    /// Decide which site instance a navigation to `url` should execute in.
    ///
    /// The returned site instance (when a new one is produced) is kept alive
    /// until the embedding framework has consumed the decision, by queueing a
    /// no-op continuation on the coordinator thread that retains a reference
    /// until the current task completes; this component holds no long-term
    /// reference itself.
    pub fn site_instance_for_navigation(
        &mut self,
        browsing_context: BrowsingContextId,
        current_instance: &Rc<dyn SiteInstance>,
        url: &Url,
        factory: &dyn SiteInstanceFactory,
        tasks: &LocalTaskSender,
    ) -> NavigationOutcome {
        // The suppression flag is consumed on entry, even when the extension
        // policy intercepts the navigation below.
        if mem::replace(&mut self.suppress_process_restart_once, false) {
            debug!("Process restart suppressed for navigation to {}.", url);
            return NavigationOutcome::ReuseCurrentInstance;
        }

        if let Some(extension_policy) = &self.extension_policy {
            let from_url = current_instance.site_url();
            if let Some(decision) =
                extension_policy.override_navigation(&**current_instance, &from_url, url)
            {
                debug!("Extension policy decided {:?} for {}.", decision, url);
                return NavigationOutcome::Deferred(decision);
            }
        }

        // Navigations that only run script in the existing document never
        // trigger a process change.
        if url.scheme() == JAVASCRIPT_SCHEME {
            return NavigationOutcome::ReuseCurrentInstance;
        }

        let instance = factory.create_for_url(browsing_context, url);

        let retained = instance.clone();
        tasks.post(Box::new(move || drop(retained)));

        NavigationOutcome::NewInstanceForUrl(instance)
    }

    /// Whether a navigation from `site_instance` may open `url`. The
    /// extension policy may override; the default is to allow.
    pub fn should_allow_open_url(&self, site_instance: &dyn SiteInstance, url: &Url) -> bool {
        if let Some(extension_policy) = &self.extension_policy {
            let from_url = site_instance.site_url();
            if let Some(allow) =
                extension_policy.should_allow_open_url(site_instance, &from_url, url)
            {
                return allow;
            }
        }
        true
    }

    /// Whether every page of `effective_url`'s site should share one
    /// process. The extension policy may override; the default is no.
    pub fn should_use_process_per_site(
        &self,
        browsing_context: BrowsingContextId,
        effective_url: &Url,
    ) -> bool {
        self.extension_policy
            .as_ref()
            .and_then(|policy| policy.should_use_process_per_site(browsing_context, effective_url))
            .unwrap_or(false)
    }

    /// Whether navigating `site_instance` from `current_url` to `new_url`
    /// must swap browsing instances. The extension policy may override; the
    /// default is no.
    pub fn should_swap_browsing_instances(
        &self,
        site_instance: &dyn SiteInstance,
        current_url: &Url,
        new_url: &Url,
    ) -> bool {
        self.extension_policy
            .as_ref()
            .and_then(|policy| {
                policy.should_swap_browsing_instances(site_instance, current_url, new_url)
            })
            .unwrap_or(false)
    }

    /// Whether the embedder allows this window-open request. Without a
    /// delegate, window creation is always allowed.
    pub fn can_create_window(&self, request: &NavigationRequest) -> bool {
        match &self.window_open_delegate {
            Some(delegate) => delegate.can_create_window(request),
            None => true,
        }
    }
}
