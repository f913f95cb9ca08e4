//! Collections, roles and status vocabularies shared by the store and the API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field names used when building filters and defaults.
pub mod fields {
    pub const EMAIL: &str = "email";
    pub const ROLE: &str = "role";
    pub const STATUS: &str = "status";
    pub const REQUESTER_EMAIL: &str = "requesterEmail";
    pub const DONOR_NAME: &str = "donorName";
    pub const DONOR_EMAIL: &str = "donorEmail";
    pub const BLOOD_GROUP: &str = "bloodGroup";
    pub const DISTRICT: &str = "district";
    pub const UPAZILA: &str = "upazila";
    pub const TITLE: &str = "title";
    pub const CREATED_AT: &str = "createdAt";
    pub const DATE: &str = "date";
    pub const AMOUNT: &str = "amount";
}

/// The collections the platform stores documents in.
///
/// Each collection lives in its own database, mirroring the deployment the
/// service grew up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    DonationRequests,
    Blogs,
    Funds,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::DonationRequests,
        Collection::Blogs,
        Collection::Funds,
    ];

    pub fn database(&self) -> &'static str {
        match self {
            Collection::Users => "registerDB",
            Collection::DonationRequests => "requestDB",
            Collection::Blogs => "blogDB",
            Collection::Funds => "fundDB",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "userCollection",
            Collection::DonationRequests => "donationRequest",
            Collection::Blogs => "blogs",
            Collection::Funds => "funds",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database(), self.name())
    }
}

/// Role of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Donor,
    Volunteer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Donor => "donor",
            Role::Volunteer => "volunteer",
            Role::Admin => "admin",
        }
    }

    /// Admins and volunteers run the platform; donors only use it.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Volunteer)
    }

    /// Parse the `role` field of a stored user. Unknown values are not a role.
    pub fn from_document(doc: &crate::Document) -> Option<Self> {
        doc.get(fields::ROLE)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }
}

/// Whether a user may act on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Blocked => "blocked",
        }
    }

    pub fn from_document(doc: &crate::Document) -> Option<Self> {
        doc.get(fields::STATUS)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }
}

/// Lifecycle of a donation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Canceled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "inprogress",
            RequestStatus::Done => "done",
            RequestStatus::Canceled => "canceled",
        }
    }
}

/// Publication state of a blog post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Draft,
    Published,
}

impl BlogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Published => "published",
        }
    }
}
