use foundation::ids::ElementId;
use foundation::value::LatLng;
use layers::symbology::ColorStop;
use runtime::callback::CallbackId;
use serde::Serialize;

use crate::controls::{MONTHS, Widget};
use crate::dashboard::Dashboard;
use crate::groups::{Content, Group, GroupKind};

/// Serializable description of the dashboard's visual tree, handed to the
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: String,
    pub prefix: String,
    pub blocks: Vec<GroupLayout>,
    pub tabs: Vec<GroupLayout>,
    pub layers: Vec<LayerLayout>,
    pub markers: Vec<MarkerLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupLayout {
    pub id: ElementId,
    pub kind: GroupKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<CallbackId>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Item {
    Select {
        id: ElementId,
        value: String,
        options: Vec<SelectOption>,
    },
    Number {
        id: ElementId,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
        step: f64,
    },
    Text {
        id: ElementId,
        value: String,
    },
    Output {
        id: ElementId,
        title: String,
    },
    Static {
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerLayout {
    pub index: usize,
    pub label: String,
    /// Tile URL at the default input values.
    pub url: String,
    pub params: Vec<ElementId>,
    pub legend: Vec<ColorStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerLayout {
    pub id: ElementId,
    pub position: LatLng,
}

impl Layout {
    pub fn describe(dashboard: &Dashboard) -> Self {
        Self {
            title: dashboard.title().to_string(),
            prefix: dashboard.prefix().to_string(),
            blocks: dashboard
                .controls()
                .iter()
                .map(|g| render_group(g, dashboard.controls().kind()))
                .collect(),
            tabs: dashboard
                .plots()
                .iter()
                .map(|g| render_group(g, dashboard.plots().kind()))
                .collect(),
            layers: dashboard
                .layers()
                .iter()
                .map(|l| LayerLayout {
                    index: l.id().0,
                    label: l.label.clone(),
                    url: dashboard.tile_url(l, dashboard.defaults()),
                    params: l.params().iter().map(|p| p.id.clone()).collect(),
                    legend: l.style.color_map.stops().to_vec(),
                })
                .collect(),
            markers: dashboard
                .markers()
                .iter()
                .map(|m| MarkerLayout {
                    id: m.id.clone(),
                    position: m.position,
                })
                .collect(),
        }
    }
}

fn render_group(group: &Group, kind: GroupKind) -> GroupLayout {
    GroupLayout {
        id: group.id.clone(),
        kind,
        title: group.title.clone(),
        visibility: group.visibility,
        items: group.contents.iter().map(render_content).collect(),
    }
}

fn render_content(content: &Content) -> Item {
    match content {
        Content::Control(control) => match &control.widget {
            Widget::Month { default } => Item::Select {
                id: control.id.clone(),
                value: default.to_string(),
                options: MONTHS
                    .iter()
                    .map(|(label, value)| SelectOption {
                        label: label.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
            },
            Widget::Select { options, default } => Item::Select {
                id: control.id.clone(),
                value: default.clone(),
                options: options
                    .iter()
                    .map(|o| SelectOption {
                        label: o.clone(),
                        value: o.clone(),
                    })
                    .collect(),
            },
            Widget::Number {
                min,
                max,
                step,
                default,
            } => Item::Number {
                id: control.id.clone(),
                value: *default,
                min: *min,
                max: *max,
                step: *step,
            },
            Widget::Text { default } => Item::Text {
                id: control.id.clone(),
                value: default.clone(),
            },
        },
        Content::Output(output) => Item::Output {
            id: output.id.clone(),
            title: output.title.clone(),
        },
        Content::Static(text) => Item::Static {
            content: text.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::Item;
    use crate::controls::NumberRange;
    use crate::session::Session;
    use compute::pipeline::TilePipeline;
    use foundation::value::{LatLng, Value};
    use runtime::function::ComputeFunction;
    use serde_json::json;

    #[test]
    fn describes_groups_in_declaration_order() {
        let mut s = Session::new("Monthly Climatology", "monthly");
        s.controls().group_with_id("block1", "First Group").unwrap();
        s.controls().month("m0", "jan").unwrap();
        s.controls().label("foo").unwrap();
        s.controls().group_with_id("block2", "Second Group").unwrap();
        s.controls()
            .number("num0", NumberRange::between(0.0, 100.0).with_default(50.0))
            .unwrap();
        s.controls()
            .group_shown_when(
                "Third Group",
                ComputeFunction::new(["num0"], |i| Ok(Value::Bool(i.number("num0")? >= 50.0))),
            )
            .unwrap();
        s.marker("pin", LatLng::new(10.0, 20.0)).unwrap();
        let d = s.freeze(TilePipeline::default());

        let layout = d.layout();
        assert_eq!(layout.blocks.len(), 3);
        assert_eq!(layout.blocks[0].items.len(), 2);
        assert!(matches!(&layout.blocks[0].items[0], Item::Select { options, .. } if options.len() == 12));
        assert_eq!(layout.blocks[0].items[1], Item::Static { content: "foo".into() });
        assert!(layout.blocks[2].visibility.is_some());
        assert!(layout.tabs.is_empty());

        let v = serde_json::to_value(&layout).unwrap();
        assert_eq!(v["blocks"][1]["items"][0]["type"], json!("number"));
        assert_eq!(v["blocks"][1]["items"][0]["value"], json!(50.0));
        assert_eq!(v["blocks"][1]["kind"], json!("block"));
        assert_eq!(v["markers"][0]["position"], json!({ "lat": 10.0, "lng": 20.0 }));
        assert!(v["blocks"][0].get("visibility").is_none());
    }
}
