use std::fmt;

use serde::{Deserialize, Serialize};

/// A layer identifier: the GDS (layer, datatype) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId {
    pub layer: u16,
    pub datatype: u16,
}

impl LayerId {
    pub const fn new(layer: u16, datatype: u16) -> Self {
        Self { layer, datatype }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.layer, self.datatype)
    }
}

impl From<(u16, u16)> for LayerId {
    fn from((layer, datatype): (u16, u16)) -> Self {
        Self::new(layer, datatype)
    }
}

/// A named technology layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Layer {
    pub fn new(name: &str, gds_layer: u16, gds_datatype: u16) -> Self {
        Self {
            id: LayerId::new(gds_layer, gds_datatype),
            name: name.to_string(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }
}

/// The layer map of a technology: names to GDS layer/datatype pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a layer. A later layer with the same name replaces the earlier one.
    pub fn add_layer(&mut self, layer: Layer) {
        if let Some(existing) = self.layers.iter_mut().find(|l| l.name == layer.name) {
            log::debug!("Redefining layer {} as {}", layer.name, layer.id);
            *existing = layer;
        } else {
            self.layers.push(layer);
        }
    }

    pub fn get_layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Human-readable name for a layer id, falling back to the numeric pair.
    pub fn display_name(&self, id: LayerId) -> String {
        match self.get_layer(id) {
            Some(layer) => format!("{} {}", layer.name, id),
            None => id.to_string(),
        }
    }

    pub fn all_layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_lookup() {
        let mut stack = LayerStack::new();
        stack.add_layer(Layer::new("Metal4drawing", 50, 0).with_description("Metal 4"));
        stack.add_layer(Layer::new("Metal4nofill", 50, 23));
        assert_eq!(stack.layer_count(), 2);
        assert_eq!(
            stack.get_layer_by_name("Metal4nofill").unwrap().id,
            LayerId::new(50, 23)
        );
        assert_eq!(stack.get_layer(LayerId::new(50, 0)).unwrap().description, "Metal 4");
        assert_eq!(stack.display_name(LayerId::new(50, 0)), "Metal4drawing (50, 0)");
        assert_eq!(stack.display_name(LayerId::new(1, 2)), "(1, 2)");
    }

    #[test]
    fn test_redefine_layer_by_name() {
        let mut stack = LayerStack::new();
        stack.add_layer(Layer::new("MIMdrawing", 36, 0));
        stack.add_layer(Layer::new("MIMdrawing", 36, 1));
        assert_eq!(stack.layer_count(), 1);
        assert_eq!(stack.all_layers()[0].id, LayerId::new(36, 1));
    }

    #[test]
    fn test_layer_id_ordering() {
        let mut ids = vec![LayerId::new(67, 0), LayerId::new(50, 23), LayerId::new(50, 0)];
        ids.sort();
        assert_eq!(ids, vec![LayerId::new(50, 0), LayerId::new(50, 23), LayerId::new(67, 0)]);
    }
}
