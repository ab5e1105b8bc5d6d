//! Static install/uninstall plans per cluster role

use super::{ReadinessGate, Step};
use crate::argocd::{APPLICATION_CRD, SERVER_SELECTOR};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    /// Cluster running the control-plane services
    Hub,
    /// Managed target registered with a hub
    Spoke,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Hub => write!(f, "hub"),
            Role::Spoke => write!(f, "spoke"),
        }
    }
}

/// Ordered install steps for `role`
pub fn install_steps(role: Role, namespace: &str, gate_timeout: Duration) -> Vec<Step> {
    match role {
        Role::Hub => vec![
            Step::new("hub/crds.yaml", "Control-plane CRDs")
                .with_gate(ReadinessGate::crd_established(APPLICATION_CRD, gate_timeout)),
            Step::new("hub/install.yaml", "Control-plane services")
                .in_namespace(namespace)
                .with_gate(ReadinessGate::pods_ready(
                    namespace,
                    SERVER_SELECTOR,
                    gate_timeout,
                )),
            Step::new("hub/ingress.yaml", "Hub ingress").in_namespace(namespace),
        ],
        Role::Spoke => vec![
            Step::new("spoke/rbac.yaml", "Manager service account and RBAC"),
            Step::new("spoke/config.yaml", "Spoke configuration").in_namespace(namespace),
        ],
    }
}

/// Removal steps for `role`: the install plan reversed, without gates
pub fn uninstall_steps(role: Role, namespace: &str) -> Vec<Step> {
    install_steps(role, namespace, Duration::ZERO)
        .into_iter()
        .rev()
        .map(|mut step| {
            step.gate = None;
            step
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninstall_is_reverse_of_install() {
        for role in [Role::Hub, Role::Spoke] {
            let install: Vec<_> = install_steps(role, "argocd", Duration::from_secs(60))
                .into_iter()
                .map(|s| (s.resource, s.namespace))
                .collect();
            let mut uninstall: Vec<_> = uninstall_steps(role, "argocd")
                .into_iter()
                .map(|s| (s.resource, s.namespace))
                .collect();
            uninstall.reverse();
            assert_eq!(install, uninstall, "role {}", role);
        }
    }

    #[test]
    fn test_uninstall_has_no_gates() {
        assert!(
            uninstall_steps(Role::Hub, "argocd")
                .iter()
                .all(|s| s.gate.is_none())
        );
    }

    #[test]
    fn test_hub_plan_gates_crds_before_services() {
        let steps = install_steps(Role::Hub, "gitops", Duration::from_secs(30));
        assert_eq!(
            steps[0].gate.as_ref().map(|g| g.timeout),
            Some(Duration::from_secs(30))
        );
        assert_eq!(steps[1].namespace.as_deref(), Some("gitops"));
        assert!(steps[1].gate.is_some());
    }
}
