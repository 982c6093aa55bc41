// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use storage_types::{BlockDevice, MAX_RECURSION_DEPTH};
use tracing::debug;

use crate::error::{Result, SysError};

/// Key holding the device array in `lsblk --json` output
pub const OUTPUT_KEY: &str = "blockdevices";

/// Decode `lsblk --json` output into the raw device tree.
///
/// Nodes are read directly from the document. `children` of a node at
/// [`MAX_RECURSION_DEPTH`] are skipped unread, so arbitrarily deep input
/// neither hits the JSON nesting limit nor grows the stack.
pub fn decode(output: &[u8]) -> Result<Vec<BlockDevice>> {
    if output.iter().all(u8::is_ascii_whitespace) {
        return Err(SysError::EmptyInput);
    }

    let mut deserializer = serde_json::Deserializer::from_slice(output);
    let devices = DocumentSeed
        .deserialize(&mut deserializer)
        .and_then(|devices| deserializer.end().map(|()| devices))
        .map_err(|error| {
            debug!(
                "failed to unmarshal lsblk output ({} bytes): {}",
                output.len(),
                error
            );
            SysError::parse(output, error)
        })?;

    devices.ok_or(SysError::MissingKey(OUTPUT_KEY))
}

/// Top-level object; yields `None` when the device key is absent.
struct DocumentSeed;

impl<'de> DeserializeSeed<'de> for DocumentSeed {
    type Value = Option<Vec<BlockDevice>>;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed {
    type Value = Option<Vec<BlockDevice>>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an object with a `{OUTPUT_KEY}` array")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut map: A,
    ) -> std::result::Result<Self::Value, A::Error> {
        let mut devices = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == OUTPUT_KEY {
                devices = Some(map.next_value_seed(DeviceListSeed { depth: 0 })?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(devices)
    }
}

/// A device array (or `null`) whose entries sit at `depth`.
struct DeviceListSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for DeviceListSeed {
    type Value = Vec<BlockDevice>;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_option(self)
    }
}

impl<'de> Visitor<'de> for DeviceListSeed {
    type Value = Vec<BlockDevice>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a list of block devices or null")
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_some<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
    ) -> std::result::Result<Self::Value, A::Error> {
        let mut devices = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(dev) = seq.next_element_seed(DeviceSeed { depth: self.depth })? {
            devices.push(dev);
        }
        Ok(devices)
    }
}

/// One device object. Scalar fields go through the regular
/// [`BlockDevice`] deserializer; `children` recurse with a depth count.
struct DeviceSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for DeviceSeed {
    type Value = BlockDevice;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DeviceSeed {
    type Value = BlockDevice;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a block device object")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut map: A,
    ) -> std::result::Result<Self::Value, A::Error> {
        let mut fields = Map::new();
        let mut children = Vec::new();

        while let Some(key) = map.next_key::<String>()? {
            if key != "children" {
                fields.insert(key, map.next_value::<Value>()?);
            } else if self.depth < MAX_RECURSION_DEPTH {
                children = map.next_value_seed(DeviceListSeed {
                    depth: self.depth + 1,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
                debug!(
                    "skipping children of {:?}: depth limit {} reached",
                    fields.get("name").and_then(serde_json::Value::as_str).unwrap_or_default(),
                    MAX_RECURSION_DEPTH
                );
            }
        }

        let mut dev: BlockDevice = serde_json::from_value(Value::Object(fields))
            .map_err(<A::Error as de::Error>::custom)?;
        dev.children = children;
        Ok(dev)
    }
}
