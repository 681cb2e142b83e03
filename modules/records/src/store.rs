//! Where the service gets its queryable sources from.

use std::io::Read;
use std::sync::Arc;

use serde::Deserialize;
use spec_core::QueryExecutor;
use spec_db::{MemoryError, MemorySource};

use crate::error::DomainError;
use crate::model::{Employee, Order, Visit, Visitor};

/// Hands out a fresh, unfiltered source per entity for every query.
pub trait RecordStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    type Visits: QueryExecutor<Visit, Error = Self::Error>;
    type Visitors: QueryExecutor<Visitor, Error = Self::Error>;
    type Orders: QueryExecutor<Order, Error = Self::Error>;
    type Employees: QueryExecutor<Employee, Error = Self::Error>;

    fn visits(&self) -> Self::Visits;
    fn visitors(&self) -> Self::Visitors;
    fn orders(&self) -> Self::Orders;
    fn employees(&self) -> Self::Employees;
}

/// On-disk dataset layout. Visits are nested under their visitor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub employees: Vec<Employee>,
    pub visitors: Vec<Visitor>,
    pub orders: Vec<Order>,
}

impl Dataset {
    pub fn from_json_str(s: &str) -> Result<Self, DomainError> {
        serde_json::from_str(s).map_err(|e| DomainError::dataset(e.to_string()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DomainError> {
        serde_json::from_reader(reader).map_err(|e| DomainError::dataset(e.to_string()))
    }
}

/// Dataset held in process, queried through [`MemorySource`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    employees: Arc<Vec<Employee>>,
    visitors: Arc<Vec<Visitor>>,
    visits: Arc<Vec<Visit>>,
    orders: Arc<Vec<Order>>,
}

impl MemoryStore {
    pub fn new(mut dataset: Dataset) -> Self {
        for visitor in &mut dataset.visitors {
            for visit in &mut visitor.visits {
                visit.visitor_id = visitor.id;
            }
        }

        let visits: Vec<Visit> = dataset
            .visitors
            .iter()
            .flat_map(|v| v.visits.iter().cloned())
            .collect();

        tracing::debug!(
            employees = dataset.employees.len(),
            visitors = dataset.visitors.len(),
            visits = visits.len(),
            orders = dataset.orders.len(),
            "dataset loaded"
        );

        Self {
            employees: Arc::new(dataset.employees),
            visitors: Arc::new(dataset.visitors),
            visits: Arc::new(visits),
            orders: Arc::new(dataset.orders),
        }
    }
}

impl RecordStore for MemoryStore {
    type Error = MemoryError;

    type Visits = MemorySource<Visit>;
    type Visitors = MemorySource<Visitor>;
    type Orders = MemorySource<Order>;
    type Employees = MemorySource<Employee>;

    fn visits(&self) -> Self::Visits {
        MemorySource::shared(self.visits.clone())
    }

    fn visitors(&self) -> Self::Visitors {
        MemorySource::shared(self.visitors.clone())
    }

    fn orders(&self) -> Self::Orders {
        MemorySource::shared(self.orders.clone())
    }

    fn employees(&self) -> Self::Employees {
        MemorySource::shared(self.employees.clone())
    }
}
