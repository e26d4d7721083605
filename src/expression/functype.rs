//! Semantic classification of function nodes.
//!
//! Optimizer rules never look at function names; they ask for the
//! `Functype` of a node (equality predicates for join detection, spatial
//! relations for index matching, and so on).

/// Function classification tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Functype {
    UnknownFunc,

    // Comparison
    EqFunc,
    /// Null-safe equality `<=>`
    EqualFunc,
    NeFunc,
    LtFunc,
    LeFunc,
    GeFunc,
    GtFunc,

    /// Full-text MATCH
    FtFunc,
    LikeFunc,

    // NULL tests
    IsNullFunc,
    IsNotNullFunc,
    IsNotNullTestFunc,

    // Logical
    CondAndFunc,
    CondOrFunc,
    XorFunc,
    NotFunc,
    NotAllFunc,

    Between,
    InFunc,
    MultEqualFunc,
    IntervalFunc,

    // Spatial relations
    SpEqualsFunc,
    SpDisjointFunc,
    SpIntersectsFunc,
    SpTouchesFunc,
    SpCrossesFunc,
    SpWithinFunc,
    SpContainsFunc,
    SpOverlapsFunc,

    // Spatial accessors
    SpStartPoint,
    SpEndPoint,
    SpExteriorRing,
    SpPointN,
    SpGeometryN,
    SpInteriorRingN,

    NowFunc,
    TrigCondFunc,
    /// `@var := expr`
    SUserVarFunc,
    /// `@var`
    GUserVarFunc,
    /// `@@var`
    GSysVarFunc,
    CollateFunc,
    ExtractFunc,
    CharTypecastFunc,
    /// Stored procedure call
    FuncSp,
    UdfFunc,
    NegFunc,
}

impl Functype {
    /// Binary comparison predicates, including null-safe equality
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Functype::EqFunc
                | Functype::EqualFunc
                | Functype::NeFunc
                | Functype::LtFunc
                | Functype::LeFunc
                | Functype::GeFunc
                | Functype::GtFunc
        )
    }

    /// Predicates that can serve as an equi-join condition
    pub fn is_join_condition(self) -> bool {
        matches!(
            self,
            Functype::EqFunc | Functype::EqualFunc | Functype::MultEqualFunc
        )
    }

    pub fn is_null_test(self) -> bool {
        matches!(
            self,
            Functype::IsNullFunc | Functype::IsNotNullFunc | Functype::IsNotNullTestFunc
        )
    }

    pub fn is_logical_connective(self) -> bool {
        matches!(
            self,
            Functype::CondAndFunc
                | Functype::CondOrFunc
                | Functype::XorFunc
                | Functype::NotFunc
                | Functype::NotAllFunc
        )
    }

    /// Spatial predicates usable for spatial index matching
    pub fn is_spatial_relation(self) -> bool {
        matches!(
            self,
            Functype::SpEqualsFunc
                | Functype::SpDisjointFunc
                | Functype::SpIntersectsFunc
                | Functype::SpTouchesFunc
                | Functype::SpCrossesFunc
                | Functype::SpWithinFunc
                | Functype::SpContainsFunc
                | Functype::SpOverlapsFunc
        )
    }

    pub fn is_spatial_accessor(self) -> bool {
        matches!(
            self,
            Functype::SpStartPoint
                | Functype::SpEndPoint
                | Functype::SpExteriorRing
                | Functype::SpPointN
                | Functype::SpGeometryN
                | Functype::SpInteriorRingN
        )
    }

    /// Reads session or global state rather than row data
    pub fn is_variable(self) -> bool {
        matches!(
            self,
            Functype::SUserVarFunc | Functype::GUserVarFunc | Functype::GSysVarFunc
        )
    }
}
