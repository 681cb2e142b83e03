use std::fmt::Display;

use serde::Serialize;
use spec_core::{
    create_paged_list_with, evaluate, LimitCfg, PageList, ParamsConfig, QueryExecutor,
    SpecParams,
};

use crate::error::DomainError;
use crate::model::{Employee, Order, Visit, VisitStatus, Visitor};
use crate::specs;
use crate::store::RecordStore;

/// Row counts reported by the `check` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub employees: u64,
    pub visitors: u64,
    pub visits: u64,
    pub checked_in: u64,
    pub orders: u64,
}

/// Runs the named specifications against a [`RecordStore`].
pub struct RecordsService<S> {
    store: S,
    cfg: ParamsConfig,
}

fn query_failed(e: impl Display) -> DomainError {
    DomainError::query(e.to_string())
}

impl<S: RecordStore> RecordsService<S> {
    pub fn new(store: S, cfg: ParamsConfig) -> Self {
        Self { store, cfg }
    }

    pub fn config(&self) -> ParamsConfig {
        self.cfg
    }

    fn limits(&self) -> LimitCfg {
        LimitCfg {
            default: self.cfg.default_page_size,
            max: self.cfg.max_page_size,
        }
    }

    /// One page of visits. The total comes from a separate count query that
    /// shares the page's criteria.
    pub async fn list_visits(&self, params: &SpecParams) -> Result<PageList<Visit>, DomainError> {
        tracing::debug!(?params, "listing visits");

        let count_spec = specs::visits_for_count(params)?;
        let total = evaluate(&count_spec, self.store.visits())
            .map_err(query_failed)?
            .count()
            .await
            .map_err(query_failed)?;

        let spec = specs::visits_with_filters(params)?;
        let items = evaluate(&spec, self.store.visits())
            .map_err(query_failed)?
            .fetch()
            .await
            .map_err(query_failed)?;

        Ok(PageList::new(
            items,
            total,
            params.page_index(),
            params.page_size(),
        ))
    }

    pub async fn list_visitors(
        &self,
        params: &SpecParams,
    ) -> Result<PageList<Visitor>, DomainError> {
        tracing::debug!(?params, "listing visitors");

        let spec = specs::visitors_with_visits(params)?.without_paging();
        let source = evaluate(&spec, self.store.visitors()).map_err(query_failed)?;

        Ok(create_paged_list_with(
            source,
            params.page_index(),
            params.page_size(),
            self.limits(),
        )
        .await?)
    }

    pub async fn orders_for_buyer(
        &self,
        buyer_email: &str,
        params: &SpecParams,
    ) -> Result<PageList<Order>, DomainError> {
        tracing::debug!(buyer = buyer_email, ?params, "listing orders");

        let spec = specs::orders_for_buyer(buyer_email, params)?.without_paging();
        let source = evaluate(&spec, self.store.orders()).map_err(query_failed)?;

        Ok(create_paged_list_with(
            source,
            params.page_index(),
            params.page_size(),
            self.limits(),
        )
        .await?)
    }

    /// Most recent `take` visits still checked in.
    pub async fn checked_in_visits(&self, take: u64) -> Result<Vec<Visit>, DomainError> {
        let spec = specs::checked_in_visits(take)?;
        evaluate(&spec, self.store.visits())
            .map_err(query_failed)?
            .fetch()
            .await
            .map_err(query_failed)
    }

    pub async fn order_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Order, DomainError> {
        let spec = specs::order_by_payment_intent(payment_intent_id)?;
        let orders = evaluate(&spec, self.store.orders())
            .map_err(query_failed)?
            .fetch()
            .await
            .map_err(query_failed)?;

        orders.into_iter().next().ok_or_else(|| {
            tracing::debug!(payment_intent_id, "order lookup missed");
            DomainError::order_not_found(payment_intent_id)
        })
    }

    pub async fn employees_by_department(
        &self,
        department: Option<&str>,
    ) -> Result<Vec<Employee>, DomainError> {
        let spec = specs::employees_by_department(department)?;
        evaluate(&spec, self.store.employees())
            .map_err(query_failed)?
            .fetch()
            .await
            .map_err(query_failed)
    }

    pub async fn summary(&self) -> Result<Summary, DomainError> {
        let checked_in = spec_core::Specification::builder()
            .criteria(Visit::STATUS.eq(VisitStatus::CheckedIn))
            .build()?;

        let summary = Summary {
            employees: self.store.employees().count().await.map_err(query_failed)?,
            visitors: self.store.visitors().count().await.map_err(query_failed)?,
            visits: self.store.visits().count().await.map_err(query_failed)?,
            checked_in: evaluate(&checked_in, self.store.visits())
                .map_err(query_failed)?
                .count()
                .await
                .map_err(query_failed)?,
            orders: self.store.orders().count().await.map_err(query_failed)?,
        };
        tracing::info!(?summary, "dataset summary");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Dataset, MemoryStore};

    fn service() -> RecordsService<MemoryStore> {
        RecordsService::new(MemoryStore::new(Dataset::default()), ParamsConfig::default())
    }

    #[tokio::test]
    async fn empty_store_yields_empty_pages() {
        let svc = service();
        let page = svc.list_visits(&SpecParams::default()).await.unwrap();

        assert_eq!(page.total_count(), 0);
        assert_eq!(page.total_pages(), 0);
        assert!(page.items().is_empty());
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let err = service().order_by_payment_intent("pi_missing").await.unwrap_err();
        assert_eq!(err, DomainError::order_not_found("pi_missing"));
    }

    #[tokio::test]
    async fn zero_take_is_an_invalid_specification() {
        let err = service().checked_in_visits(0).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidSpecification(_)));
    }
}
