use super::types::{parse_column, Region, SupplierRole, SupplierStatus};
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Supplier account. `regions` and `certifications` are comma separated lists.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rhy_suppliers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub company_name: String,
    pub contact_name: String,
    pub role: String,
    pub status: String,
    pub regions: String,
    pub certifications: String,
    pub mfa_enabled: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn role(&self) -> Result<SupplierRole, ServiceError> {
        parse_column(&self.role, "rhy_suppliers.role")
    }

    pub fn status(&self) -> Result<SupplierStatus, ServiceError> {
        parse_column(&self.status, "rhy_suppliers.status")
    }

    pub fn region_list(&self) -> Result<Vec<Region>, ServiceError> {
        split_list(&self.regions)
            .map(|r| parse_column(r, "rhy_suppliers.regions"))
            .collect()
    }

    pub fn certification_list(&self) -> Vec<String> {
        split_list(&self.certifications).map(str::to_string).collect()
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map_or(false, |until| until > now)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub fn join_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_uppercase())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
