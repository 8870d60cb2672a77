//! Kaniko builder pod manifests shared by both checkpoint strategies.

use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, KeyToPath, Pod, PodSpec, SecretVolumeSource, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

const KANIKO_IMAGE: &str = "gcr.io/kaniko-project/executor:latest";
const SECRET_MOUNT_PATH: &str = "/kaniko/.docker";
const BUILD_CONTEXT_MOUNT_PATH: &str = "/kaniko-build-context";

fn secret_volume(secret_name: &str) -> Volume {
    Volume {
        name: "kaniko-secret".to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name.to_string()),
            items: Some(vec![KeyToPath {
                key: ".dockerconfigjson".to_string(),
                path: "config.json".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn secret_mount() -> VolumeMount {
    VolumeMount {
        name: "kaniko-secret".to_string(),
        mount_path: SECRET_MOUNT_PATH.to_string(),
        ..Default::default()
    }
}

/// The stdin variant: unconstrained node, context piped over stdin.
pub fn stdin_manifest(namespace: &str, registry_secret_name: &str, image_ref: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            generate_name: Some("kaniko-".to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            containers: vec![Container {
                name: "kaniko".to_string(),
                image: Some(KANIKO_IMAGE.to_string()),
                args: Some(vec![
                    "--dockerfile=Dockerfile".to_string(),
                    "--context=tar://stdin".to_string(),
                    format!("--destination={image_ref}"),
                ]),
                stdin: Some(true),
                stdin_once: Some(true),
                volume_mounts: Some(vec![secret_mount()]),
                ..Default::default()
            }],
            volumes: Some(vec![secret_volume(registry_secret_name)]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The filesystem variant: pinned to `local_node`, context mounted as a host-path
/// directory volume.
pub fn filesystem_manifest(
    namespace: &str,
    registry_secret_name: &str,
    image_ref: &str,
    local_node: &str,
    host_context_dir: &str,
) -> Pod {
    let build_context_volume = Volume {
        name: "build-context".to_string(),
        host_path: Some(HostPathVolumeSource {
            path: host_context_dir.to_string(),
            type_: Some("Directory".to_string()),
        }),
        ..Default::default()
    };
    let build_context_mount = VolumeMount {
        name: "build-context".to_string(),
        mount_path: BUILD_CONTEXT_MOUNT_PATH.to_string(),
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta {
            generate_name: Some("kaniko-".to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            node_name: Some(local_node.to_string()),
            containers: vec![Container {
                name: "kaniko".to_string(),
                image: Some(KANIKO_IMAGE.to_string()),
                args: Some(vec![
                    format!("--dockerfile={BUILD_CONTEXT_MOUNT_PATH}/Dockerfile"),
                    format!("--context=dir://{BUILD_CONTEXT_MOUNT_PATH}"),
                    format!("--destination={image_ref}"),
                ]),
                volume_mounts: Some(vec![secret_mount(), build_context_mount]),
                ..Default::default()
            }],
            volumes: Some(vec![secret_volume(registry_secret_name), build_context_volume]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdin_manifest_has_no_host_path_volume() {
        let pod = stdin_manifest("ns", "kaniko-secret", "registry.example/app:abc");
        let spec = pod.spec.unwrap();
        assert_eq!(spec.node_name, None);
        assert_eq!(spec.volumes.unwrap().len(), 1);
    }

    #[test]
    fn test_filesystem_manifest_pins_local_node() {
        let pod = filesystem_manifest(
            "ns",
            "kaniko-secret",
            "registry.example/app:abc",
            "node-a",
            "/tmp/build-contexts/context-1",
        );
        let spec = pod.spec.unwrap();
        assert_eq!(spec.node_name.as_deref(), Some("node-a"));
        assert_eq!(spec.volumes.unwrap().len(), 2);
    }
}
