//! CloudFormation template rendering
//!
//! Turns the declared resource set into a template the provider's own
//! reconciliation engine can deploy.

use fleetscale_cloud::{
    CloudError, RemovalPolicy, ResourceConfig, ResourceSet, Result, resource_type,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

const SSM_MANAGED_POLICY: &str =
    "arn:${AWS::Partition}:iam::aws:policy/AmazonSSMManagedInstanceCore";

const LAUNCH_TEMPLATE_SUFFIX: &str = "LaunchTemplate";
const INSTANCE_ROLE_SUFFIX: &str = "InstanceRole";
const INSTANCE_PROFILE_SUFFIX: &str = "InstanceProfile";

#[derive(Debug, Deserialize)]
pub(crate) struct KeyPairProps {
    pub key_name: String,
    pub removal_policy: RemovalPolicy,
}

#[derive(Debug, Deserialize)]
struct ImageProps {
    image_id: String,
}

#[derive(Debug, Deserialize)]
struct BlockDeviceProps {
    device_name: String,
    size_gib: u32,
    volume_type: String,
    encrypted: bool,
}

#[derive(Debug, Deserialize)]
struct CapacityProps {
    min: u32,
    max: u32,
    desired: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct HealthCheckProps {
    #[serde(rename = "type")]
    kind: String,
    grace_period_secs: u64,
}

#[derive(Debug, Deserialize)]
struct FleetProps {
    image: ImageProps,
    instance_type: String,
    block_devices: Vec<BlockDeviceProps>,
    subnet_ids: Vec<String>,
    key_name: String,
    capacity: CapacityProps,
    health_check: HealthCheckProps,
    #[serde(default)]
    ssm_session_permissions: bool,
    user_data: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PolicyProps {
    pub fleet_id: String,
    metric: String,
    target_percent: u32,
}

#[derive(Debug, Deserialize)]
struct OutputProps {
    value: String,
    description: Option<String>,
}

/// Render the whole resource set
pub fn render(resources: &ResourceSet) -> Result<Value> {
    let mut rendered = Map::new();
    let mut outputs = Map::new();

    for key_pair in resources.by_type(resource_type::KEY_PAIR) {
        let props: KeyPairProps = key_pair.payload()?;
        let deletion = match props.removal_policy {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        };
        insert_resource(
            &mut rendered,
            key_pair.id.clone(),
            json!({
                "Type": "AWS::EC2::KeyPair",
                "Properties": { "KeyName": props.key_name },
                "DeletionPolicy": deletion,
                "UpdateReplacePolicy": deletion,
            }),
        )?;
    }

    for fleet in resources.by_type(resource_type::SCALABLE_FLEET) {
        render_fleet(resources, fleet, &mut rendered)?;
    }

    for policy in resources.by_type(resource_type::SCALING_POLICY) {
        let props: PolicyProps = policy.payload()?;
        insert_resource(
            &mut rendered,
            policy.id.clone(),
            json!({
                "Type": "AWS::AutoScaling::ScalingPolicy",
                "Properties": {
                    "AutoScalingGroupName": { "Ref": props.fleet_id },
                    "PolicyType": "TargetTrackingScaling",
                    "TargetTrackingConfiguration": {
                        "PredefinedMetricSpecification": {
                            "PredefinedMetricType": props.metric,
                        },
                        "TargetValue": props.target_percent,
                    },
                },
            }),
        )?;
    }

    for output in resources.by_type(resource_type::OUTPUT) {
        let props: OutputProps = output.payload()?;
        let mut entry = Map::new();
        entry.insert("Value".to_string(), substitute(&props.value));
        if let Some(description) = props.description {
            entry.insert("Description".to_string(), Value::String(description));
        }
        outputs.insert(output.id.clone(), Value::Object(entry));
    }

    let mut template = Map::new();
    template.insert("AWSTemplateFormatVersion".to_string(), json!("2010-09-09"));
    template.insert("Resources".to_string(), Value::Object(rendered));
    if !outputs.is_empty() {
        template.insert("Outputs".to_string(), Value::Object(outputs));
    }
    Ok(Value::Object(template))
}

fn render_fleet(
    resources: &ResourceSet,
    fleet: &ResourceConfig,
    rendered: &mut Map<String, Value>,
) -> Result<()> {
    let props: FleetProps = fleet.payload()?;
    let id = &fleet.id;
    let launch_template_id = format!("{}{}", id, LAUNCH_TEMPLATE_SUFFIX);

    // Reference the declared key pair so it is created before the template
    let key_name = resources
        .by_type(resource_type::KEY_PAIR)
        .into_iter()
        .find(|k| {
            k.get_config::<String>("key_name").as_deref() == Some(props.key_name.as_str())
        })
        .map(|k| json!({ "Ref": k.id }))
        .unwrap_or_else(|| json!(props.key_name));

    let block_devices: Vec<Value> = props
        .block_devices
        .iter()
        .map(|device| {
            json!({
                "DeviceName": device.device_name,
                "Ebs": {
                    "VolumeSize": device.size_gib,
                    "VolumeType": device.volume_type,
                    "Encrypted": device.encrypted,
                },
            })
        })
        .collect();

    let mut launch_data = json!({
        "ImageId": props.image.image_id,
        "InstanceType": props.instance_type,
        "KeyName": key_name,
        "BlockDeviceMappings": block_devices,
        "UserData": { "Fn::Base64": props.user_data },
    });

    if props.ssm_session_permissions {
        let role_id = format!("{}{}", id, INSTANCE_ROLE_SUFFIX);
        let profile_id = format!("{}{}", id, INSTANCE_PROFILE_SUFFIX);
        insert_resource(
            rendered,
            role_id.clone(),
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "ec2.amazonaws.com" },
                            "Action": "sts:AssumeRole",
                        }],
                    },
                    "ManagedPolicyArns": [{ "Fn::Sub": SSM_MANAGED_POLICY }],
                },
            }),
        )?;
        insert_resource(
            rendered,
            profile_id.clone(),
            json!({
                "Type": "AWS::IAM::InstanceProfile",
                "Properties": { "Roles": [{ "Ref": role_id }] },
            }),
        )?;
        launch_data["IamInstanceProfile"] =
            json!({ "Arn": { "Fn::GetAtt": [profile_id, "Arn"] } });
    }

    insert_resource(
        rendered,
        launch_template_id.clone(),
        json!({
            "Type": "AWS::EC2::LaunchTemplate",
            "Properties": { "LaunchTemplateData": launch_data },
        }),
    )?;

    let mut group = json!({
        "MinSize": props.capacity.min.to_string(),
        "MaxSize": props.capacity.max.to_string(),
        "VPCZoneIdentifier": props.subnet_ids,
        "HealthCheckType": props.health_check.kind,
        "HealthCheckGracePeriod": props.health_check.grace_period_secs,
        "LaunchTemplate": {
            "LaunchTemplateId": { "Ref": launch_template_id },
            "Version": { "Fn::GetAtt": [launch_template_id, "LatestVersionNumber"] },
        },
    });
    if let Some(desired) = props.capacity.desired {
        group["DesiredCapacity"] = json!(desired.to_string());
    }

    insert_resource(
        rendered,
        id.clone(),
        json!({
            "Type": "AWS::AutoScaling::AutoScalingGroup",
            "Properties": group,
        }),
    )?;
    Ok(())
}

/// Template resource names a declaration renders to. Outputs have their own
/// namespace and render to none.
pub(crate) fn rendered_ids(resource: &ResourceConfig) -> Vec<String> {
    match resource.resource_type.as_str() {
        resource_type::OUTPUT => Vec::new(),
        resource_type::SCALABLE_FLEET => {
            let id = &resource.id;
            let mut ids = vec![id.clone(), format!("{}{}", id, LAUNCH_TEMPLATE_SUFFIX)];
            if resource
                .get_config::<bool>("ssm_session_permissions")
                .unwrap_or(false)
            {
                ids.push(format!("{}{}", id, INSTANCE_ROLE_SUFFIX));
                ids.push(format!("{}{}", id, INSTANCE_PROFILE_SUFFIX));
            }
            ids
        }
        _ => vec![resource.id.clone()],
    }
}

fn insert_resource(rendered: &mut Map<String, Value>, id: String, resource: Value) -> Result<()> {
    if rendered.contains_key(&id) {
        return Err(CloudError::ResourceAlreadyExists(format!(
            "template resource {}",
            id
        )));
    }
    rendered.insert(id, resource);
    Ok(())
}

/// Values carrying `${...}` tokens are resolved by CloudFormation at deploy time
fn substitute(value: &str) -> Value {
    if value.contains("${") {
        json!({ "Fn::Sub": value })
    } else {
        Value::String(value.to_string())
    }
}
