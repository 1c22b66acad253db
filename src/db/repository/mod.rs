pub mod business;
pub mod campaign;
pub mod campaign_delivery;
pub mod customer;
pub mod payment;

pub use business::{BusinessRepository, CreateBusiness};
pub use campaign::{CampaignRepository, CreateCampaign, UpdateCampaign};
pub use campaign_delivery::CampaignDeliveryRepository;
pub use customer::{CreateCustomer, CustomerRepository, UpdateCustomer};
pub use payment::{KlarnaOrderRepository, PaymentTransactionRepository, SwishPaymentRepository};
