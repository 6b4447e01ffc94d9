//! Registry of the API methods the client knows how to call.
//!
//! Each `Method` variant carries its `Category` (which decides URL shape and
//! authentication) and its `Submission` style (which decides the HTTP verb).
//! The pairing is not derivable from the names: `ad-get` is a GET while
//! `ad-get/ad_id` is a POST, so it is spelled out per variant.

use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// How a method is reached and authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Public buy/sell advertisement feeds served from the site root.
    OnlineAd,
    /// Unauthenticated calls under the API base.
    Public,
    /// HMAC-signed calls under the API base.
    Private,
}

/// Whether parameters travel in a form body (POST) or the query (GET).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Query,
    Body,
}

/// Classification result for a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    pub method: Method,
    pub category: Category,
    pub submission: Submission,
}

/// Every method the service exposes to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    BuyBitcoinsOnline,
    SellBitcoinsOnline,
    CountryCodes,
    AdGet,
    AdGetById,
    Myself,
    Ads,
    Ad,
    Dashboard,
    DashboardReleased,
    DashboardCanceled,
    DashboardClosed,
    DashboardReleasedBuyer,
    DashboardCanceledBuyer,
    DashboardClosedBuyer,
    DashboardReleasedSeller,
    DashboardCanceledSeller,
    DashboardClosedSeller,
    WalletSend,
    Wallet,
    WalletBalance,
    WalletAddr,
    ContactInfo,
}

impl Method {
    pub const ALL: [Method; 23] = [
        Method::BuyBitcoinsOnline,
        Method::SellBitcoinsOnline,
        Method::CountryCodes,
        Method::AdGet,
        Method::AdGetById,
        Method::Myself,
        Method::Ads,
        Method::Ad,
        Method::Dashboard,
        Method::DashboardReleased,
        Method::DashboardCanceled,
        Method::DashboardClosed,
        Method::DashboardReleasedBuyer,
        Method::DashboardCanceledBuyer,
        Method::DashboardClosedBuyer,
        Method::DashboardReleasedSeller,
        Method::DashboardCanceledSeller,
        Method::DashboardClosedSeller,
        Method::WalletSend,
        Method::Wallet,
        Method::WalletBalance,
        Method::WalletAddr,
        Method::ContactInfo,
    ];

    /// Wire name, used verbatim as the URL path segment(s).
    pub fn name(&self) -> &'static str {
        match self {
            Method::BuyBitcoinsOnline => "buy-bitcoins-online",
            Method::SellBitcoinsOnline => "sell-bitcoins-online",
            Method::CountryCodes => "countrycodes",
            Method::AdGet => "ad-get",
            Method::AdGetById => "ad-get/ad_id",
            Method::Myself => "myself",
            Method::Ads => "ads",
            Method::Ad => "ad",
            Method::Dashboard => "dashboard",
            Method::DashboardReleased => "dashboard/released",
            Method::DashboardCanceled => "dashboard/canceled",
            Method::DashboardClosed => "dashboard/closed",
            Method::DashboardReleasedBuyer => "dashboard/released/buyer",
            Method::DashboardCanceledBuyer => "dashboard/canceled/buyer",
            Method::DashboardClosedBuyer => "dashboard/closed/buyer",
            Method::DashboardReleasedSeller => "dashboard/released/seller",
            Method::DashboardCanceledSeller => "dashboard/canceled/seller",
            Method::DashboardClosedSeller => "dashboard/closed/seller",
            Method::WalletSend => "wallet-send",
            Method::Wallet => "wallet",
            Method::WalletBalance => "wallet-balance",
            Method::WalletAddr => "wallet-addr",
            Method::ContactInfo => "contact_info",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Method::BuyBitcoinsOnline | Method::SellBitcoinsOnline => Category::OnlineAd,
            Method::CountryCodes => Category::Public,
            _ => Category::Private,
        }
    }

    pub fn submission(&self) -> Submission {
        match self {
            Method::AdGetById
            | Method::Myself
            | Method::Ads
            | Method::Ad
            | Method::WalletSend
            | Method::WalletBalance
            | Method::WalletAddr => Submission::Body,
            Method::BuyBitcoinsOnline
            | Method::SellBitcoinsOnline
            | Method::CountryCodes
            | Method::AdGet
            | Method::Dashboard
            | Method::DashboardReleased
            | Method::DashboardCanceled
            | Method::DashboardClosed
            | Method::DashboardReleasedBuyer
            | Method::DashboardCanceledBuyer
            | Method::DashboardClosedBuyer
            | Method::DashboardReleasedSeller
            | Method::DashboardCanceledSeller
            | Method::DashboardClosedSeller
            | Method::Wallet
            | Method::ContactInfo => Submission::Query,
        }
    }

    pub fn spec(&self) -> MethodSpec {
        MethodSpec {
            method: *self,
            category: self.category(),
            submission: self.submission(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| ApiError::UnknownMethod(s.to_string()))
    }
}

/// Look up a method by its wire name.
pub fn classify(name: &str) -> Result<MethodSpec, ApiError> {
    name.parse::<Method>().map(|m| m.spec())
}
