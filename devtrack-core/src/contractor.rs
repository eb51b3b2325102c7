//! Contractor device endpoints.
//!
//! Thin calls over the authenticated transport. Each returns an
//! [`ApiResult`]; credential attachment and refresh are handled by the
//! transport.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::transport::{ApiTransport, RequestDescriptor};

const DEVICES_PATH: &str = "/Contractors/me/devices";
const DEVICE_STATUS_PATH: &str = "/Contractors/me/devices/status";
const CURRENT_CONTRACTOR_PATH: &str = "/contractors/me";
const DASHBOARD_PATH: &str = "/reports/dashboard";

/// A device assigned to the contractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub serial_number: String,
    pub status: String,
    #[serde(default)]
    pub assigned_date: Option<String>,
    #[serde(default)]
    pub is_returned: bool,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub total_count: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Filters for the device list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceQuery {
    pub page: Option<u32>,
    pub page_size: u32,
    pub status: Option<String>,
    pub search: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl DeviceQuery {
    /// First page of `page_size` devices, no filters.
    pub fn page_size(page_size: u32) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    fn to_request(&self) -> RequestDescriptor {
        let blank_to_none = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        RequestDescriptor::get(DEVICES_PATH)
            .query_opt("page", self.page)
            .query("pageSize", self.page_size)
            .query_opt("status", blank_to_none(&self.status))
            .query_opt("search", blank_to_none(&self.search))
            .query_opt("fromDate", blank_to_none(&self.from_date))
            .query_opt("toDate", blank_to_none(&self.to_date))
    }
}

/// Current status of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub serial_number: String,
    pub status: String,
}

/// Body of a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeviceStatusRequest {
    pub serial_number: String,
    pub new_status: String,
}

/// Server acknowledgement of a status change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDeviceStatusResponse {
    #[serde(default, alias = "Message")]
    pub message: String,
}

/// The signed-in contractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contractor {
    pub contractor_id: i64,
    pub contractor_name: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub modified_by: Option<String>,
    #[serde(default)]
    pub modified_date: Option<String>,
}

/// Monthly counts on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorTrend {
    pub month: String,
    pub assigned_count: u64,
    pub installed_count: u64,
    pub activated_count: u64,
}

/// Aggregated device counts for a contractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractorDashboard {
    pub total: u64,
    pub pending_install: u64,
    pub installed: u64,
    pub activated: u64,
    #[serde(default)]
    pub monthly_trends: Vec<ContractorTrend>,
}

/// Contractor device operations.
#[derive(Debug, Clone)]
pub struct ContractorService {
    transport: Arc<ApiTransport>,
}

impl ContractorService {
    pub fn new(transport: Arc<ApiTransport>) -> Self {
        Self { transport }
    }

    /// Devices assigned to the signed-in contractor.
    pub async fn devices(&self, query: &DeviceQuery) -> ApiResult<PagedResult<Device>> {
        if query.page_size == 0 {
            return Err(ApiError::validation("Page size must be at least 1."));
        }
        self.transport.send_json(query.to_request()).await
    }

    /// Status of a single device.
    pub async fn device_by_serial(&self, serial_number: &str) -> ApiResult<DeviceStatus> {
        let serial_number = path_segment(serial_number, "Serial number")?;
        let path = format!("{}/{}", DEVICES_PATH, serial_number);
        self.transport.send_json(RequestDescriptor::get(path)).await
    }

    /// Move a device to a new status.
    pub async fn update_device_status(
        &self,
        request: &UpdateDeviceStatusRequest,
    ) -> ApiResult<UpdateDeviceStatusResponse> {
        path_segment(&request.serial_number, "Serial number")?;
        if request.new_status.trim().is_empty() {
            return Err(ApiError::validation("New status is required."));
        }
        self.transport.put_json(DEVICE_STATUS_PATH, request).await
    }

    /// Profile of the signed-in contractor.
    pub async fn current_contractor(&self) -> ApiResult<Contractor> {
        self.transport
            .send_json(RequestDescriptor::get(CURRENT_CONTRACTOR_PATH))
            .await
    }

    /// Dashboard aggregates for `contractor_id`.
    pub async fn dashboard(&self, contractor_id: &str) -> ApiResult<ContractorDashboard> {
        let contractor_id = path_segment(contractor_id, "Contractor id")?;
        let path = format!("{}/{}", DASHBOARD_PATH, contractor_id);
        self.transport.send_json(RequestDescriptor::get(path)).await
    }
}

/// Validate a value interpolated into a path.
fn path_segment<'a>(value: &'a str, field: &str) -> ApiResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(format!("{} is required.", field)));
    }
    if value.contains(['/', '?', '#', '\\', '%']) || value.chars().all(|c| c == '.') {
        return Err(ApiError::validation(format!("{} contains invalid characters.", field)));
    }
    Ok(value)
}
