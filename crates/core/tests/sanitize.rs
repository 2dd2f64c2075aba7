#![forbid(unsafe_code)]

use kubesnap_core::pipeline::{self, Outcome, Step, DEFAULT_STEPS};
use serde_json::{json, Value};

fn sanitized(doc: Value) -> Value {
    match pipeline::run(DEFAULT_STEPS, doc).unwrap() {
        Outcome::Keep(v) => v,
        Outcome::Veto => panic!("unexpected veto"),
    }
}

#[test]
fn owned_objects_are_vetoed() {
    let doc = json!({
        "apiVersion": "apps/v1",
        "kind": "ReplicaSet",
        "metadata": {
            "name": "web-6d4cf56db6",
            "namespace": "default",
            "ownerReferences": [
                {"apiVersion": "apps/v1", "kind": "Deployment", "name": "web", "uid": "d9607e19"}
            ],
            "resourceVersion": "12345"
        }
    });
    assert_eq!(pipeline::run(DEFAULT_STEPS, doc).unwrap(), Outcome::Veto);
}

#[test]
fn empty_owner_references_do_not_veto() {
    let doc = json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": "settings", "ownerReferences": []}
    });
    assert!(matches!(
        pipeline::run(DEFAULT_STEPS, doc).unwrap(),
        Outcome::Keep(_)
    ));
}

#[test]
fn veto_short_circuits_later_steps() {
    // The malformed selector would make the Job step error, but the owner
    // filter runs first and wins.
    let doc = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": "owned",
            "ownerReferences": [{"kind": "CronJob", "name": "nightly"}]
        },
        "spec": {"selector": "bogus"}
    });
    assert_eq!(pipeline::run(DEFAULT_STEPS, doc).unwrap(), Outcome::Veto);
}

#[test]
fn sanitizer_clears_assigned_identity_and_status() {
    let doc = json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": "settings",
            "namespace": "default",
            "uid": "3c2a6ef1-9f3b-4a61-b9a4-1a53a9c8e210",
            "resourceVersion": "998877",
            "generation": 4,
            "selfLink": "/api/v1/namespaces/default/configmaps/settings",
            "creationTimestamp": "2024-03-01T09:00:00Z",
            "managedFields": [{"manager": "kubectl"}]
        },
        "data": {"retries": "3"},
        "status": {"observed": true}
    });
    let out = sanitized(doc);
    let meta = out.get("metadata").unwrap();
    for key in [
        "uid",
        "resourceVersion",
        "generation",
        "selfLink",
        "creationTimestamp",
        "managedFields",
    ] {
        assert!(meta.get(key).is_none(), "{key} should be gone");
    }
    assert!(out.get("status").is_none());
    assert_eq!(out["data"]["retries"], "3");
}

#[test]
fn only_the_volatile_annotations_are_removed() {
    let doc = json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": "checkout-api",
            "annotations": {
                "kubectl.kubernetes.io/last-applied-configuration": "{\"apiVersion\":\"apps/v1\"}",
                "deployment.kubernetes.io/revision": "7",
                "kubernetes.io/change-cause": "kubectl set image",
                "team": "infra"
            }
        }
    });
    let out = sanitized(doc);
    assert_eq!(out["metadata"]["annotations"], json!({"team": "infra"}));
}

#[test]
fn emptied_annotations_render_as_absent() {
    let doc = json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": "web",
            "annotations": {"deployment.kubernetes.io/revision": "3"}
        }
    });
    let out = sanitized(doc);
    assert!(out["metadata"].get("annotations").is_none());
}

#[test]
fn job_step_leaves_other_kinds_untouched() {
    let doc = json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": "web"},
        "spec": {"selector": {"matchLabels": {"controller-uid": "leave-me"}}}
    });
    let out = match Step::Job.process(doc.clone()).unwrap() {
        Outcome::Keep(v) => v,
        Outcome::Veto => panic!("unexpected veto"),
    };
    assert_eq!(out, doc);
}

#[test]
fn job_step_ignores_non_batch_job_kinds() {
    let doc = json!({
        "apiVersion": "example.io/v1",
        "kind": "Job",
        "metadata": {"name": "custom"},
        "spec": {"selector": {"matchLabels": {"controller-uid": "leave-me"}}}
    });
    let out = match Step::Job.process(doc.clone()).unwrap() {
        Outcome::Keep(v) => v,
        Outcome::Veto => panic!("unexpected veto"),
    };
    assert_eq!(out, doc);
}

#[test]
fn job_controller_label_is_stripped_from_both_locations() {
    let doc = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {"name": "migrate-db"},
        "spec": {
            "selector": {"matchLabels": {"controller-uid": "abc123"}},
            "template": {
                "metadata": {"labels": {"controller-uid": "abc123", "job-name": "migrate-db"}},
                "spec": {"containers": []}
            }
        },
        "status": {"succeeded": 1}
    });
    let out = sanitized(doc);
    // controller-uid was the selector's only entry, so the map collapsed.
    assert!(out["spec"]["selector"].get("matchLabels").is_none());
    assert_eq!(
        out["spec"]["template"]["metadata"]["labels"],
        json!({"job-name": "migrate-db"})
    );
    assert!(out.get("status").is_none());
}

#[test]
fn job_without_selector_is_fine() {
    let doc = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {"name": "one-off"},
        "spec": {
            "template": {
                "metadata": {"labels": {"controller-uid": "abc123"}},
                "spec": {"containers": []}
            }
        }
    });
    let out = sanitized(doc);
    assert!(out["spec"]["template"]["metadata"].get("labels").is_none());
}

#[test]
fn pipeline_output_is_idempotent() {
    let doc = json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": "checkout-api",
            "namespace": "default",
            "labels": {"app": "checkout", "tier": "backend"},
            "annotations": {
                "deployment.kubernetes.io/revision": "7",
                "team": "infra"
            },
            "resourceVersion": "443322",
            "uid": "0f41b6a2-5a3e-4a5d-8c9e-6a7b8c9d0e1f"
        },
        "spec": {"replicas": 2},
        "status": {"readyReplicas": 2}
    });
    let once = sanitized(doc.clone());
    let twice = sanitized(once.clone());
    assert_eq!(
        serde_json::to_string(&once).unwrap(),
        serde_json::to_string(&twice).unwrap()
    );
    let again = sanitized(doc);
    assert_eq!(
        serde_json::to_string(&once).unwrap(),
        serde_json::to_string(&again).unwrap()
    );
}

#[test]
fn malformed_documents_error_instead_of_passing_through() {
    let err = pipeline::run(DEFAULT_STEPS, json!("not an object")).unwrap_err();
    assert!(err.to_string().contains("not a mapping"));

    let err = pipeline::run(
        DEFAULT_STEPS,
        json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {"name": "j"},
            "spec": {"selector": {"matchLabels": "bogus"}}
        }),
    )
    .unwrap_err();
    assert!(err.to_string().contains("matchLabels"));
}
