use postgres::Row;

use super::common::*;
use errors::*;
use repos::types::*;
use util::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl FromRow for Customer {
    fn from_row(row: &Row) -> RepoResult<Self> {
        Ok(Self {
            customer_id: CustomerId(row.try_get("customer_id")?),
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct CustomerFilter {
    pub customer_id: Option<CustomerId>,
    pub email: Option<String>,
}

impl CustomerFilter {
    pub fn matches(&self, customer: &Customer) -> bool {
        self.customer_id.map_or(true, |v| v == customer.customer_id)
            && self.email.as_ref().map_or(true, |v| *v == customer.email)
    }
}

impl From<CustomerId> for CustomerFilter {
    fn from(v: CustomerId) -> Self {
        Self {
            customer_id: Some(v),
            ..Default::default()
        }
    }
}

impl Filter for CustomerFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.customer_id {
            b = b.with_filter("customer_id", v.0);
        }

        if let Some(v) = self.email {
            b = b.with_filter("email", v);
        }

        b
    }
}
