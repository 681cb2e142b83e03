//! Named query shapes. Each function builds a fresh specification from the
//! normalized parameters; none of them is cached.

use std::str::FromStr;

use spec_core::{Predicate, SortDir, SpecParams, SpecResult, Specification};

use crate::model::{Employee, Order, Visit, VisitStatus, Visitor};

/// Sort token as accepted in the `sort` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortToken {
    CheckInAsc,
    CheckInDesc,
    StatusAsc,
    StatusDesc,
    NameAsc,
    NameDesc,
    OrderedAtAsc,
    OrderedAtDesc,
}

impl SortToken {
    pub fn as_str(self) -> &'static str {
        match self {
            SortToken::CheckInAsc => "checkInAsc",
            SortToken::CheckInDesc => "checkInDesc",
            SortToken::StatusAsc => "statusAsc",
            SortToken::StatusDesc => "statusDesc",
            SortToken::NameAsc => "nameAsc",
            SortToken::NameDesc => "nameDesc",
            SortToken::OrderedAtAsc => "orderedAtAsc",
            SortToken::OrderedAtDesc => "orderedAtDesc",
        }
    }

    pub fn dir(self) -> SortDir {
        match self {
            SortToken::CheckInAsc
            | SortToken::StatusAsc
            | SortToken::NameAsc
            | SortToken::OrderedAtAsc => SortDir::Asc,
            _ => SortDir::Desc,
        }
    }
}

impl FromStr for SortToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = match s.trim().to_ascii_lowercase().as_str() {
            "checkinasc" => SortToken::CheckInAsc,
            "checkindesc" => SortToken::CheckInDesc,
            "statusasc" => SortToken::StatusAsc,
            "statusdesc" => SortToken::StatusDesc,
            "nameasc" => SortToken::NameAsc,
            "namedesc" => SortToken::NameDesc,
            "orderedatasc" => SortToken::OrderedAtAsc,
            "orderedatdesc" => SortToken::OrderedAtDesc,
            _ => return Err(s.to_string()),
        };
        Ok(token)
    }
}

/// Sort token from `params`, if it parses and `applies` to the entity.
fn requested_sort(params: &SpecParams, applies: fn(SortToken) -> bool) -> Option<SortToken> {
    let raw = params.sort()?;
    match raw.parse::<SortToken>() {
        Ok(token) if applies(token) => Some(token),
        Ok(token) => {
            tracing::debug!(sort = token.as_str(), "sort token does not apply, using default");
            None
        }
        Err(raw) => {
            tracing::debug!(sort = %raw, "unknown sort token, using default");
            None
        }
    }
}

/* ---------- visits ---------- */

/// Shared by the paged and the count specification so both see the same rows.
fn visit_criteria(params: &SpecParams) -> Option<Predicate<Visit>> {
    params.search().map(|term| {
        Visit::PURPOSE.to_lower().contains(term).or(&Visit::HOST
            .nav()
            .then_field(Employee::NAME)
            .to_lower()
            .contains(term))
    })
}

pub fn visits_with_filters(params: &SpecParams) -> SpecResult<Specification<Visit>> {
    let builder = Specification::builder()
        .and_criteria_opt(visit_criteria(params))
        .add_include(&Visit::HOST.nav());

    let builder = match requested_sort(params, |t| {
        matches!(
            t,
            SortToken::CheckInAsc
                | SortToken::CheckInDesc
                | SortToken::StatusAsc
                | SortToken::StatusDesc
        )
    }) {
        Some(t @ (SortToken::StatusAsc | SortToken::StatusDesc)) => {
            builder.add_order(&Visit::STATUS.nav(), t.dir())
        }
        Some(t) => builder.add_order(&Visit::CHECK_IN_AT.nav(), t.dir()),
        None => builder.add_order_by_descending(&Visit::CHECK_IN_AT.nav()),
    };

    builder
        .apply_paging(params.skip(), params.take())
        .as_no_tracking()
        .build()
}

pub fn visits_for_count(params: &SpecParams) -> SpecResult<Specification<Visit>> {
    Specification::builder()
        .and_criteria_opt(visit_criteria(params))
        .build()
}

/// Most recent check-ins that are still on site.
pub fn checked_in_visits(take: u64) -> SpecResult<Specification<Visit>> {
    Specification::builder()
        .criteria(Visit::STATUS.eq(VisitStatus::CheckedIn))
        .add_include(&Visit::HOST.nav())
        .add_order_by_descending(&Visit::CHECK_IN_AT.nav())
        .apply_paging(0, take)
        .as_no_tracking()
        .build()
}

/* ---------- visitors ---------- */

/// Visitors with their visits and each visit's host.
///
/// `childCount` keeps visitors with at least that many visits; `search`
/// matches name or email.
pub fn visitors_with_visits(params: &SpecParams) -> SpecResult<Specification<Visitor>> {
    let search = params.search().map(|term| {
        Visitor::NAME
            .to_lower()
            .contains(term)
            .or(&Visitor::EMAIL.to_lower().contains(term))
    });
    let min_visits = params
        .child_count()
        .map(|n| Visitor::VISITS.count().ge(n));

    let visits = Visitor::VISITS.nav();
    let builder = Specification::builder()
        .and_criteria_opt(search)
        .and_criteria_opt(min_visits)
        .add_include(&visits)
        .add_include(&visits.then_include(&Visit::HOST.nav()));

    let builder = match requested_sort(params, |t| {
        matches!(t, SortToken::NameAsc | SortToken::NameDesc)
    }) {
        Some(token) => builder.add_order(&Visitor::NAME.nav(), token.dir()),
        None => builder.add_order_by(&Visitor::NAME.nav()),
    };

    builder.apply_paging(params.skip(), params.take()).build()
}

/* ---------- orders ---------- */

pub fn order_by_payment_intent(payment_intent_id: &str) -> SpecResult<Specification<Order>> {
    Specification::builder()
        .criteria(Order::PAYMENT_INTENT_ID.eq(payment_intent_id))
        .add_include(&Order::ITEMS.nav())
        .build()
}

/// Orders placed by `buyer_email` (case-insensitive).
pub fn orders_for_buyer(
    buyer_email: &str,
    params: &SpecParams,
) -> SpecResult<Specification<Order>> {
    let email = buyer_email.trim().to_lowercase();
    let search = params
        .search()
        .map(|term| Order::PAYMENT_INTENT_ID.to_lower().contains(term));

    let builder = Specification::builder()
        .criteria(Order::BUYER_EMAIL.to_lower().eq(email))
        .and_criteria_opt(search)
        .add_include(&Order::ITEMS.nav());

    let builder = match requested_sort(params, |t| {
        matches!(t, SortToken::OrderedAtAsc | SortToken::OrderedAtDesc)
    }) {
        Some(token) => builder.add_order(&Order::ORDERED_AT.nav(), token.dir()),
        None => builder.add_order_by_descending(&Order::ORDERED_AT.nav()),
    };

    builder
        .apply_paging(params.skip(), params.take())
        .as_no_tracking()
        .build()
}

/* ---------- employees ---------- */

/// Employees grouped by department, by name within a department.
pub fn employees_by_department(department: Option<&str>) -> SpecResult<Specification<Employee>> {
    let filter = department.map(|d| {
        Employee::DEPARTMENT
            .to_lower()
            .eq(d.trim().to_lowercase())
    });

    Specification::builder()
        .and_criteria_opt(filter)
        .apply_group_by(&Employee::DEPARTMENT.nav())
        .add_order_by(&Employee::NAME.nav())
        .build()
}
