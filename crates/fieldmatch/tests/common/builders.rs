//! Builders for test documents, templates and mapping rules.

#![allow(dead_code)]

use std::collections::BTreeMap;

use fieldmatch::template::{FieldType, TemplateField};
use fieldmatch::{
    FieldMap, FieldValue, MappingConfigInput, MappingRule, MappingScope, SourceDocument, Template,
    TransformParams, TransformType,
};

/// Builder for `SourceDocument`.
pub struct DocumentBuilder {
    id: String,
    company_id: Option<String>,
    format_id: Option<String>,
    fields: FieldMap,
}

impl DocumentBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            company_id: None,
            format_id: None,
            fields: FieldMap::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.fields
            .insert(name.to_string(), Some(FieldValue::from(value)));
        self
    }

    pub fn number(mut self, name: &str, value: f64) -> Self {
        self.fields
            .insert(name.to_string(), Some(FieldValue::Number(value)));
        self
    }

    pub fn null(mut self, name: &str) -> Self {
        self.fields.insert(name.to_string(), None);
        self
    }

    pub fn company(mut self, company_id: &str) -> Self {
        self.company_id = Some(company_id.to_string());
        self
    }

    pub fn format(mut self, format_id: &str) -> Self {
        self.format_id = Some(format_id.to_string());
        self
    }

    pub fn build(self) -> SourceDocument {
        SourceDocument {
            id: self.id,
            company_id: self.company_id,
            format_id: self.format_id,
            fields: self.fields,
        }
    }
}

/// Builder for `Template`.
pub struct TemplateBuilder {
    id: String,
    row_key_field: Option<String>,
    fields: Vec<TemplateField>,
}

impl TemplateBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            row_key_field: None,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.push(TemplateField::new(name, field_type));
        self
    }

    pub fn required(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields
            .push(TemplateField::new(name, field_type).required());
        self
    }

    pub fn row_key(mut self, name: &str) -> Self {
        self.row_key_field = Some(name.to_string());
        self
    }

    pub fn build(self) -> Template {
        Template {
            name: format!("{} template", self.id),
            id: self.id,
            description: None,
            row_key_field: self.row_key_field,
            fields: self.fields,
        }
    }
}

pub fn direct(source: &str, target: &str) -> MappingRule {
    MappingRule::direct(source, target)
}

pub fn formula(source: &str, target: &str, expression: &str) -> MappingRule {
    MappingRule::direct(source, target)
        .with_transform(TransformType::Formula, TransformParams::formula(expression))
}

pub fn lookup(source: &str, target: &str, pairs: &[(&str, &str)], default: Option<&str>) -> MappingRule {
    let table: BTreeMap<String, FieldValue> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), FieldValue::from(*v)))
        .collect();
    MappingRule::direct(source, target).with_transform(
        TransformType::Lookup,
        TransformParams::lookup(table, default.map(FieldValue::from)),
    )
}

pub fn global(template_id: &str) -> MappingConfigInput {
    MappingConfigInput::new(template_id, MappingScope::Global)
}

pub fn company(template_id: &str, company_id: &str) -> MappingConfigInput {
    MappingConfigInput::new(template_id, MappingScope::Company).company(company_id)
}

pub fn format(template_id: &str, format_id: &str) -> MappingConfigInput {
    MappingConfigInput::new(template_id, MappingScope::Format).format(format_id)
}

/// Shipping template keyed by `shipment_no`.
pub fn shipping_template() -> Template {
    TemplateBuilder::new("shipping")
        .required("shipment_no", FieldType::Text)
        .required("weight", FieldType::Number)
        .required("consignee", FieldType::Text)
        .field("shipping_cost", FieldType::Number)
        .field("eta", FieldType::Date)
        .field("port", FieldType::Text)
        .row_key("shipment_no")
        .build()
}

/// GLOBAL rules matching `shipping_template`.
pub fn shipping_rules() -> MappingConfigInput {
    global("shipping")
        .rule(direct("bl_no", "shipment_no").with_order(0))
        .rule(direct("gross_weight", "weight").with_order(1))
        .rule(direct("consignee_name", "consignee").with_order(2).required())
        .rule(formula("sea_freight", "shipping_cost", "{sea_freight} + {thc}").with_order(3))
        .rule(direct("eta_date", "eta").with_order(4))
        .rule(lookup("port_code", "port", &[("KRPUS", "Busan"), ("NLRTM", "Rotterdam")], None).with_order(5))
}
