use super::{Tag, Value};

resource! {
  /// `AWS::EC2::SecurityGroup`
  pub struct SecurityGroup = "AWS::EC2::SecurityGroup" {
    group_description: Value,
    group_name: Value,
    security_group_egress: Vec<Egress>,
    security_group_ingress: Vec<Ingress>,
    tags: Vec<Tag>,
    vpc_id: Value,
  }
}

properties! {
  pub struct Ingress {
    cidr_ip: Value,
    cidr_ipv6: Value,
    description: Value,
    from_port: Value,
    ip_protocol: Value,
    source_security_group_id: Value,
    to_port: Value,
  }
}

properties! {
  pub struct Egress {
    cidr_ip: Value,
    cidr_ipv6: Value,
    description: Value,
    destination_security_group_id: Value,
    from_port: Value,
    ip_protocol: Value,
    to_port: Value,
  }
}

resource! {
  /// `AWS::EC2::LaunchTemplate`
  pub struct LaunchTemplate = "AWS::EC2::LaunchTemplate" {
    launch_template_data: LaunchTemplateData,
    launch_template_name: Value,
  }
}

properties! {
  pub struct LaunchTemplateData {
    block_device_mappings: Vec<BlockDeviceMapping>,
    image_id: Value,
    instance_type: Value,
    key_name: Value,
    metadata_options: MetadataOptions,
    security_group_ids: Value,
    tag_specifications: Value,
    user_data: Value,
  }
}

properties! {
  pub struct MetadataOptions {
    http_endpoint: Value,
    http_put_response_hop_limit: Value,
    http_tokens: Value,
  }
}

properties! {
  pub struct BlockDeviceMapping {
    device_name: Value,
    ebs: Ebs,
  }
}

properties! {
  pub struct Ebs {
    encrypted: Value,
    iops: Value,
    kms_key_id: Value,
    throughput: Value,
    volume_size: Value,
    volume_type: Value,
  }
}
