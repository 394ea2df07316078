// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Serialize;
use std::collections::BTreeMap;

#[allow(dead_code)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
pub enum GroupId {
    Image,
    Camera,
    Position,
    Instrument,
    Gauge,
    Custom(String),
}
impl Serialize for GroupId {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error> where S: serde::Serializer {
        match self {
            GroupId::Custom(x) => s.serialize_str(x),
            x                  => s.serialize_str(&format!("{:?}", x)),
        }
    }
}
impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupId::Custom(x) => f.write_str(x),
            x                  => f.write_fmt(format_args!("{:?}", x)),
        }
    }
}

#[allow(dead_code)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
pub enum TagId {
    StageX,
    StageY,
    FieldOfView,
    FieldOfViewCal,
    Exposure,
    Averaging,
    Title,
    Phi,
    Theta,
    McpScreen,
    McpChannelPlate,
    Custom(String),
    Unknown(u8),
}
impl Serialize for TagId {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error> where S: serde::Serializer {
        match self {
            TagId::Unknown(x) => s.serialize_str(&format!("0x{:x}", x)),
            TagId::Custom(x)  => s.serialize_str(x),
            x                 => s.serialize_str(&format!("{:?}", x)),
        }
    }
}
impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagId::Unknown(x) => f.write_fmt(format_args!("0x{:x}", x)),
            TagId::Custom(x)  => f.write_str(x),
            x                 => f.write_fmt(format_args!("{:?}", x)),
        }
    }
}

/// One gauge record from the tag stream: controller channel name, units and reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeReading {
    pub name: String,
    pub units: String,
    pub value: f32,
}

#[allow(non_camel_case_types)]
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    f32(f32),
    String(String),
    Gauge(GaugeReading),
}
impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValue::f32(v)    => f.write_fmt(format_args!("{}", v)),
            TagValue::String(v) => f.write_str(v),
            TagValue::Gauge(v)  => f.write_fmt(format_args!("{:e} {} ({})", v.value, v.units, v.name)),
        }
    }
}
impl Serialize for TagValue {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error> where S: serde::Serializer {
        match self {
            TagValue::f32(v)    => serde::Serialize::serialize(v, s),
            TagValue::String(v) => serde::Serialize::serialize(v, s),
            TagValue::Gauge(v)  => serde::Serialize::serialize(v, s),
        }
    }
}

pub trait TagValueRef: Sized {
    fn value_ref(v: &TagValue) -> Option<&Self>;
}
macro_rules! impl_value_ref {
    ($($field:ident:$type:ty),*,) => {
        $(
            impl TagValueRef for $type {
                fn value_ref(v: &TagValue) -> Option<&$type> {
                    if let TagValue::$field(vv) = v { Some(vv) } else { None }
                }
            }
        )*
    }
}
impl_value_ref! {
    f32:    f32,
    String: String,
    Gauge:  GaugeReading,
}

pub trait GetWithType {
    fn get_t<T: TagValueRef>(&self, k: TagId) -> Option<&T>;
}
impl GetWithType for TagMap {
    fn get_t<T: TagValueRef>(&self, k: TagId) -> Option<&T> {
        self.get(&k).and_then(|v| T::value_ref(&v.value))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagDescription {
    pub group: GroupId,
    pub id: TagId,
    /// Wire tag byte this entry was decoded from, when it came from the tag stream.
    pub native_tag: Option<u8>,
    pub description: String,
    pub value: TagValue,
}

#[macro_export]
macro_rules! tag {
    ($group:expr, $id:expr, $name:literal, $type:ident, $val:expr) => {
        $crate::tags::TagDescription { group: $group, id: $id, description: $name.to_owned(), value: $crate::tags::TagValue::$type($val), native_tag: None }
    };
    (native $native:expr, $group:expr, $id:expr, $name:literal, $type:ident, $val:expr) => {
        $crate::tags::TagDescription { group: $group, id: $id, description: $name.to_owned(), value: $crate::tags::TagValue::$type($val), native_tag: Some($native) }
    };
}

pub type TagMap = BTreeMap<TagId, TagDescription>;
pub type GroupedTagMap = BTreeMap<GroupId, TagMap>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::insert_tag;

    #[test]
    fn tags_group_by_id() {
        let mut map = GroupedTagMap::new();
        insert_tag(&mut map, tag!(native 104, GroupId::Camera, TagId::Exposure, "Camera exposure", f32, 0.25));
        insert_tag(&mut map, tag!(GroupId::Camera, TagId::Averaging, "Frame averaging", String, "off".into()));
        let camera = map.get(&GroupId::Camera).unwrap();
        assert_eq!(camera.len(), 2);
        assert_eq!(camera.get_t::<f32>(TagId::Exposure), Some(&0.25));
        assert_eq!(camera[&TagId::Exposure].native_tag, Some(104));
    }

    #[test]
    fn gauge_value_formats_with_units() {
        let v = TagValue::Gauge(GaugeReading { name: "MCH".into(), units: "mbar".into(), value: 2.5e-9 });
        assert_eq!(v.to_string(), "2.5e-9 mbar (MCH)");
    }

    #[test]
    fn ids_serialize_as_strings() {
        assert_eq!(serde_json::to_string(&GroupId::Gauge).unwrap(), "\"Gauge\"");
        assert_eq!(serde_json::to_string(&TagId::Unknown(0x66)).unwrap(), "\"0x66\"");
        assert_eq!(serde_json::to_string(&TagId::Custom("Sample Temp.".into())).unwrap(), "\"Sample Temp.\"");
    }
}
