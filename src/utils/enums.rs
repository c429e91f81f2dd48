use serde::Serialize;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Employee
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Employee => "employee"
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "superadmin" => Some(Role::Superadmin),
            "admin" => Some(Role::Admin),
            "employee" => Some(Role::Employee),
            _ => None
        }
    }

    // Where the client lands once a session is minted for this role.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Superadmin => "/superadmin/dashboard",
            Role::Admin => "/admin/dashboard",
            Role::Employee => "/employee/dashboard"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Draft,
    Published,
    Closed
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Draft => "draft",
            JobStatus::Published => "published",
            JobStatus::Closed => "closed"
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "draft" => Some(JobStatus::Draft),
            "published" => Some(JobStatus::Published),
            "closed" => Some(JobStatus::Closed),
            _ => None
        }
    }

    // Postings only move forward: draft -> published -> closed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Draft, JobStatus::Published) | (JobStatus::Published, JobStatus::Closed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Reviewing,
    Shortlisted,
    Interview,
    Offered,
    Hired,
    Rejected
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offered => "offered",
            ApplicationStatus::Hired => "hired",
            ApplicationStatus::Rejected => "rejected"
        }
    }

    pub fn parse(s: &str) -> Option<ApplicationStatus> {
        match s {
            "pending" => Some(ApplicationStatus::Pending),
            "reviewing" => Some(ApplicationStatus::Reviewing),
            "shortlisted" => Some(ApplicationStatus::Shortlisted),
            "interview" => Some(ApplicationStatus::Interview),
            "offered" => Some(ApplicationStatus::Offered),
            "hired" => Some(ApplicationStatus::Hired),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Hired | ApplicationStatus::Rejected)
    }

    fn stage(&self) -> u8 {
        match self {
            ApplicationStatus::Pending => 0,
            ApplicationStatus::Reviewing => 1,
            ApplicationStatus::Shortlisted => 2,
            ApplicationStatus::Interview => 3,
            ApplicationStatus::Offered => 4,
            ApplicationStatus::Hired => 5,
            ApplicationStatus::Rejected => 6
        }
    }

    // Applicants move forward through the pipeline, skipping stages is
    // allowed. Rejection is reachable from any non-terminal stage.
    // Hired and rejected are final.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        if next == ApplicationStatus::Rejected {
            return true;
        }
        next.stage() > self.stage()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Careers,
    Profile
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Careers => "careers",
            PageType::Profile => "profile"
        }
    }

    pub fn parse(s: &str) -> Option<PageType> {
        match s {
            "careers" => Some(PageType::Careers),
            "profile" => Some(PageType::Profile),
            _ => None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_only_moves_forward() {
        assert!(JobStatus::Draft.can_transition_to(JobStatus::Published));
        assert!(JobStatus::Published.can_transition_to(JobStatus::Closed));
        assert!(!JobStatus::Draft.can_transition_to(JobStatus::Closed));
        assert!(!JobStatus::Closed.can_transition_to(JobStatus::Published));
        assert!(!JobStatus::Published.can_transition_to(JobStatus::Draft));
    }

    #[test]
    fn application_pipeline_moves_forward() {
        assert!(ApplicationStatus::Pending.can_transition_to(ApplicationStatus::Reviewing));
        assert!(ApplicationStatus::Pending.can_transition_to(ApplicationStatus::Interview));
        assert!(ApplicationStatus::Offered.can_transition_to(ApplicationStatus::Hired));
        assert!(!ApplicationStatus::Reviewing.can_transition_to(ApplicationStatus::Pending));
        assert!(!ApplicationStatus::Interview.can_transition_to(ApplicationStatus::Interview));
    }

    #[test]
    fn rejection_is_reachable_until_terminal() {
        assert!(ApplicationStatus::Pending.can_transition_to(ApplicationStatus::Rejected));
        assert!(ApplicationStatus::Offered.can_transition_to(ApplicationStatus::Rejected));
        assert!(!ApplicationStatus::Hired.can_transition_to(ApplicationStatus::Rejected));
        assert!(!ApplicationStatus::Rejected.can_transition_to(ApplicationStatus::Reviewing));
        assert!(!ApplicationStatus::Rejected.can_transition_to(ApplicationStatus::Rejected));
    }

    #[test]
    fn role_round_trips_and_redirects() {
        for role in [Role::Superadmin, Role::Admin, Role::Employee] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("manager"), None);
        assert_eq!(Role::Admin.dashboard_path(), "/admin/dashboard");
        assert_eq!(Role::Employee.dashboard_path(), "/employee/dashboard");
    }
}
